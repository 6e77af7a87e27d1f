// Hourly series, daily rollups and since-start totals

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    /// Minutes relative to the newest bucket (0); older points are negative.
    pub offset_min: i64,
    pub down_bps: f64,
    pub up_bps: f64,
}

/// Trailing-hour series, oldest point first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyStats {
    pub interval_min: u32,
    pub points: Vec<HourlyPoint>,
}

/// One stored row: first and last counters seen on a local calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRollup {
    /// `YYYY-MM-DD`, local time.
    pub date: String,
    pub first_bytes_recv: i64,
    pub first_bytes_sent: i64,
    pub last_bytes_recv: i64,
    pub last_bytes_sent: i64,
    /// Unix seconds of the last update.
    pub timestamp: i64,
}

/// Net traffic for one date, `last - first` per direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTraffic {
    pub date: String,
    pub down_bytes: i64,
    pub up_bytes: i64,
}

/// Traffic since this process took its first successful sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SinceBootTotals {
    pub down_bytes: u64,
    pub up_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficStats {
    /// Most recent date first; dates without samples are absent.
    #[serde(rename = "daily_7d")]
    pub daily: Vec<DailyTraffic>,
    pub since_boot: SinceBootTotals,
}
