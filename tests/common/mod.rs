// Shared test helpers
#![allow(dead_code)]

use chrono::{DateTime, Local, NaiveDate, TimeDelta, TimeZone, Utc};
use netpulse::counter_source::{CounterSource, ProbeError};
use netpulse::daily_store::DailyStore;
use netpulse::models::CounterSample;
use netpulse::monitor::MonitorConfig;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Fixed UTC instant used as t=0 by time-driven tests.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub fn at_ms(base: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
    base + TimeDelta::milliseconds(millis)
}

pub fn sample(captured_at: DateTime<Utc>, bytes_sent: u64, bytes_recv: u64) -> CounterSample {
    CounterSample::new(captured_at, bytes_sent, bytes_recv)
}

/// A sample captured at local noon on `date`.
pub fn sample_on(date: NaiveDate, bytes_sent: u64, bytes_recv: u64) -> CounterSample {
    let noon = Local
        .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
        .single()
        .unwrap()
        .with_timezone(&Utc);
    sample(noon, bytes_sent, bytes_recv)
}

pub fn monitor_config() -> MonitorConfig {
    MonitorConfig {
        interface: "eth0".into(),
        max_gap: Duration::from_secs(10),
        smoothing_window: 3,
        hourly_buckets: 60,
        hourly_interval: TimeDelta::minutes(1),
        stats_days: 7,
    }
}

pub async fn temp_store() -> (TempDir, Arc<DailyStore>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("network_stats.db");
    let store = DailyStore::connect(path.to_str().unwrap(), 2).await.unwrap();
    store.init().await.unwrap();
    (dir, Arc::new(store))
}

/// Counter source that replays queued readings, then reports the interface missing.
#[derive(Default)]
pub struct ScriptedSource {
    readings: Mutex<VecDeque<Result<CounterSample, ProbeError>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reading: Result<CounterSample, ProbeError>) {
        self.readings.lock().unwrap().push_back(reading);
    }
}

impl CounterSource for ScriptedSource {
    fn read(&self, interface: &str) -> Result<CounterSample, ProbeError> {
        self.readings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProbeError::InterfaceNotFound(interface.to_string())))
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
