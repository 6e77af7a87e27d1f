// Raw interface counters and derived real-time rates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading of an interface's cumulative byte counters.
/// Monotonic within a boot cycle; superseded, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSample {
    /// Wall-clock capture time (includes host suspend, unlike a monotonic clock).
    pub captured_at: DateTime<Utc>,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

impl CounterSample {
    pub fn new(captured_at: DateTime<Utc>, bytes_sent: u64, bytes_recv: u64) -> Self {
        Self {
            captured_at,
            bytes_sent,
            bytes_recv,
        }
    }
}

/// Unsmoothed bytes-per-second for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawRates {
    pub down_bps: f64,
    pub up_bps: f64,
}

/// Smoothed real-time rate, as served to viewers and pushed over the hub.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RateSample {
    /// Unix seconds.
    pub timestamp: i64,
    /// Download, bytes per second.
    pub down_bps: f64,
    /// Upload, bytes per second.
    pub up_bps: f64,
}
