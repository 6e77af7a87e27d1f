// Orchestrator: owns the sampling state behind one reader/writer lock and
// exposes the read API used by the HTTP/WS layer. The loops live in `worker`.

pub mod worker;

use crate::config::AppConfig;
use crate::counter_source::{CounterSource, ProbeError};
use crate::daily_store::{DailyStore, RecordOutcome, StoreError};
use crate::hourly::HourlyAggregator;
use crate::hub::{Hub, HubClosed, Subscription};
use crate::models::{
    CounterSample, HourlyStats, RateSample, RawRates, SinceBootTotals, TrafficStats,
};
use crate::smoothing::SmoothingFilter;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interface: String,
    /// Elapsed time above which a sample only re-baselines (sleep/wake, starvation).
    pub max_gap: Duration,
    pub smoothing_window: usize,
    pub hourly_buckets: usize,
    pub hourly_interval: TimeDelta,
    /// Days of rollups returned by `stats()`.
    pub stats_days: u32,
}

impl MonitorConfig {
    pub fn from_app(config: &AppConfig, interface: String) -> Self {
        Self {
            interface,
            max_gap: config.monitoring.max_gap(),
            smoothing_window: config.monitoring.smoothing_window,
            hourly_buckets: config.hourly.bucket_count,
            hourly_interval: config.hourly.bucket_interval(),
            stats_days: config.database.retention_days,
        }
    }
}

/// Why a tick produced no rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapReason {
    FirstSample,
    NonPositiveElapsed,
    GapTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Rates discarded, smoothing reset; the sample is the new baseline.
    Baseline { reason: GapReason },
    Rate { raw: RawRates, smoothed: RateSample },
}

/// Bytes per second for each direction. A direction whose counter went
/// backwards (interface reset) reports 0; the other is unaffected.
pub fn compute_raw_rates(
    last: &CounterSample,
    current: &CounterSample,
    elapsed_secs: f64,
) -> RawRates {
    if elapsed_secs <= 0.0 {
        return RawRates::default();
    }
    let rate = |now: u64, before: u64| {
        if now >= before {
            (now - before) as f64 / elapsed_secs
        } else {
            0.0
        }
    };
    RawRates {
        down_bps: rate(current.bytes_recv, last.bytes_recv),
        up_bps: rate(current.bytes_sent, last.bytes_sent),
    }
}

/// Everything the sampler mutates. Guarded as a unit by `Monitor`'s lock.
#[derive(Debug, Clone)]
pub struct MonitorState {
    initial_sample: Option<CounterSample>,
    last_sample: Option<CounterSample>,
    down_filter: SmoothingFilter,
    up_filter: SmoothingFilter,
    hourly: HourlyAggregator,
    since_boot: SinceBootTotals,
    realtime: RateSample,
    max_gap: TimeDelta,
}

impl MonitorState {
    pub fn new(config: &MonitorConfig, now: DateTime<Utc>) -> Self {
        Self {
            initial_sample: None,
            last_sample: None,
            down_filter: SmoothingFilter::new(config.smoothing_window),
            up_filter: SmoothingFilter::new(config.smoothing_window),
            hourly: HourlyAggregator::new(config.hourly_buckets, config.hourly_interval, now),
            since_boot: SinceBootTotals::default(),
            realtime: RateSample::default(),
            max_gap: TimeDelta::from_std(config.max_gap).unwrap_or(TimeDelta::MAX),
        }
    }

    /// One sampling tick.
    pub fn apply(&mut self, current: CounterSample) -> TickOutcome {
        // The first successful probe is the since-start baseline.
        let initial = *self.initial_sample.get_or_insert(current);
        self.since_boot = SinceBootTotals {
            down_bytes: current.bytes_recv.saturating_sub(initial.bytes_recv),
            up_bytes: current.bytes_sent.saturating_sub(initial.bytes_sent),
        };

        let Some(last) = self.last_sample else {
            return self.rebaseline(current, GapReason::FirstSample);
        };
        let elapsed = current.captured_at - last.captured_at;
        if elapsed <= TimeDelta::zero() {
            return self.rebaseline(current, GapReason::NonPositiveElapsed);
        }
        if elapsed > self.max_gap {
            return self.rebaseline(current, GapReason::GapTooLong);
        }

        let elapsed_secs = elapsed.to_std().map(|d| d.as_secs_f64()).unwrap_or(0.0);
        if current.bytes_recv < last.bytes_recv || current.bytes_sent < last.bytes_sent {
            tracing::debug!(
                recv_regressed = current.bytes_recv < last.bytes_recv,
                sent_regressed = current.bytes_sent < last.bytes_sent,
                "interface counter went backwards; reporting 0 for that direction"
            );
        }
        let raw = compute_raw_rates(&last, &current, elapsed_secs);

        let smoothed = RateSample {
            timestamp: current.captured_at.timestamp(),
            down_bps: self.down_filter.add(raw.down_bps),
            up_bps: self.up_filter.add(raw.up_bps),
        };
        self.realtime = smoothed;
        // The hourly buckets average raw rates; their resolution absorbs the noise.
        self.hourly
            .add(current.captured_at, raw.down_bps, raw.up_bps);
        self.last_sample = Some(current);

        TickOutcome::Rate { raw, smoothed }
    }

    fn rebaseline(&mut self, current: CounterSample, reason: GapReason) -> TickOutcome {
        self.last_sample = Some(current);
        self.down_filter.reset();
        self.up_filter.reset();
        TickOutcome::Baseline { reason }
    }

    pub fn last_sample(&self) -> Option<CounterSample> {
        self.last_sample
    }

    pub fn initial_sample(&self) -> Option<CounterSample> {
        self.initial_sample
    }

    pub fn realtime(&self) -> RateSample {
        self.realtime
    }

    pub fn since_boot(&self) -> SinceBootTotals {
        self.since_boot
    }

    pub fn hourly(&self) -> &HourlyAggregator {
        &self.hourly
    }
}

/// Per-process tick tallies for the periodic stats log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCounts {
    pub accepted: u64,
    pub skipped: u64,
    pub probe_failures: u64,
}

#[derive(Default)]
struct TickCounters {
    accepted: AtomicU64,
    skipped: AtomicU64,
    probe_failures: AtomicU64,
}

pub struct Monitor {
    state: RwLock<MonitorState>,
    source: Arc<dyn CounterSource>,
    store: Arc<DailyStore>,
    hub: Hub,
    interface: String,
    stats_days: u32,
    counters: TickCounters,
}

impl Monitor {
    pub fn new(
        source: Arc<dyn CounterSource>,
        store: Arc<DailyStore>,
        hub: Hub,
        config: MonitorConfig,
    ) -> Self {
        Self {
            state: RwLock::new(MonitorState::new(&config, Utc::now())),
            source,
            store,
            hub,
            interface: config.interface,
            stats_days: config.stats_days,
            counters: TickCounters::default(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Probe the interface (outside the lock) and apply the reading.
    /// On probe failure nothing is mutated.
    pub async fn sample_once(&self) -> Result<TickOutcome, ProbeError> {
        let source = self.source.clone();
        let interface = self.interface.clone();
        let read = tokio::task::spawn_blocking(move || source.read(&interface))
            .await
            .map_err(|e| ProbeError::Unavailable(format!("probe task join: {}", e)))
            .and_then(|r| r);
        match read {
            Ok(sample) => Ok(self.ingest(sample).await),
            Err(e) => {
                self.counters.probe_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Apply one reading under the write lock, then publish the smoothed rate.
    pub async fn ingest(&self, sample: CounterSample) -> TickOutcome {
        let outcome = {
            let mut state = self.state.write().await;
            state.apply(sample)
        };
        match outcome {
            TickOutcome::Rate { smoothed, .. } => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                self.hub.broadcast(smoothed);
            }
            TickOutcome::Baseline { reason } => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(?reason, "rate computation skipped; new baseline");
            }
        }
        outcome
    }

    /// Write the latest raw sample to the daily store. The lock is held only
    /// to copy the sample. `Ok(None)` until a first sample exists.
    pub async fn persist_once(&self) -> Result<Option<RecordOutcome>, StoreError> {
        let sample = self.state.read().await.last_sample();
        let Some(sample) = sample else {
            return Ok(None);
        };
        self.store.record_sample(&sample).await.map(Some)
    }

    pub async fn realtime_rate(&self) -> RateSample {
        self.state.read().await.realtime()
    }

    /// Trailing-hour series, rebuilt from the ring on each call.
    pub async fn hourly_stats(&self) -> HourlyStats {
        self.state.read().await.hourly().stats()
    }

    pub async fn since_boot(&self) -> SinceBootTotals {
        self.state.read().await.since_boot()
    }

    /// Recent daily rollups plus since-start totals. A store failure is
    /// returned as-is, never replaced with empty or cached data.
    pub async fn stats(&self) -> Result<TrafficStats, StoreError> {
        let since_boot = self.since_boot().await;
        let daily = self.store.query_recent_days(self.stats_days).await?;
        Ok(TrafficStats { daily, since_boot })
    }

    pub async fn subscribe(&self) -> Result<Subscription, HubClosed> {
        self.hub.register().await
    }

    pub fn tick_counts(&self) -> TickCounts {
        TickCounts {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            probe_failures: self.counters.probe_failures.load(Ordering::Relaxed),
        }
    }
}
