// Domain models

mod rate;
mod traffic;

pub use rate::{CounterSample, RateSample, RawRates};
pub use traffic::{
    DailyRollup, DailyTraffic, HourlyPoint, HourlyStats, SinceBootTotals, TrafficStats,
};
