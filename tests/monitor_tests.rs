// Rate computation, gap handling and the Monitor read/write API

mod common;

use chrono::Utc;
use common::{ScriptedSource, at_ms, base_time, monitor_config, sample, temp_store};
use netpulse::counter_source::ProbeError;
use netpulse::daily_store::RecordOutcome;
use netpulse::hub::{Hub, HubConfig};
use netpulse::monitor::{GapReason, Monitor, MonitorState, TickOutcome, compute_raw_rates};
use netpulse::models::{RateSample, RawRates, SinceBootTotals};
use std::sync::Arc;

fn state() -> MonitorState {
    MonitorState::new(&monitor_config(), base_time())
}

fn expect_rate(outcome: TickOutcome) -> (RawRates, RateSample) {
    match outcome {
        TickOutcome::Rate { raw, smoothed } => (raw, smoothed),
        other => panic!("expected a rate, got {:?}", other),
    }
}

#[test]
fn raw_rates_divide_deltas_by_elapsed() {
    let t = base_time();
    let rates = compute_raw_rates(
        &sample(t, 200, 1_000),
        &sample(at_ms(t, 500), 300, 1_500),
        0.5,
    );
    assert_eq!(rates.down_bps, 1000.0);
    assert_eq!(rates.up_bps, 200.0);
}

#[test]
fn regressed_direction_reports_zero_only_for_that_direction() {
    let t = base_time();
    let rates = compute_raw_rates(&sample(t, 100, 9_000), &sample(at_ms(t, 1000), 600, 10), 1.0);
    assert_eq!(rates.down_bps, 0.0);
    assert_eq!(rates.up_bps, 500.0);
}

#[test]
fn first_sample_only_sets_the_baseline() {
    let mut s = state();
    let t = base_time();
    assert_eq!(
        s.apply(sample(t, 10, 20)),
        TickOutcome::Baseline {
            reason: GapReason::FirstSample
        }
    );
    assert_eq!(s.realtime(), RateSample::default());
    assert_eq!(s.hourly().current().count, 0);
    assert_eq!(s.last_sample(), Some(sample(t, 10, 20)));
    assert_eq!(s.initial_sample(), Some(sample(t, 10, 20)));

    let (raw, smoothed) = expect_rate(s.apply(sample(at_ms(t, 1000), 510, 2_020)));
    assert_eq!(raw.down_bps, 2000.0);
    assert_eq!(raw.up_bps, 500.0);
    assert_eq!(smoothed.down_bps, 2000.0);
    assert_eq!(smoothed.timestamp, at_ms(t, 1000).timestamp());
    assert_eq!(s.realtime(), smoothed);
    assert_eq!(s.hourly().current().count, 1);
}

#[test]
fn smoothing_averages_recent_raw_rates() {
    let mut s = state();
    let t = base_time();
    s.apply(sample(t, 0, 0));
    expect_rate(s.apply(sample(at_ms(t, 1000), 0, 100)));
    let (_, smoothed) = expect_rate(s.apply(sample(at_ms(t, 2000), 0, 400)));
    assert_eq!(smoothed.down_bps, 200.0);
}

#[test]
fn long_gap_rebaselines_and_resets_smoothing() {
    let mut s = state();
    let t = base_time();
    s.apply(sample(t, 0, 0));
    expect_rate(s.apply(sample(at_ms(t, 1000), 0, 1_000_000)));

    assert_eq!(
        s.apply(sample(at_ms(t, 12_000), 0, 2_000_000)),
        TickOutcome::Baseline {
            reason: GapReason::GapTooLong
        }
    );
    // The stale rate stays visible until the next accepted tick.
    assert_eq!(s.realtime().down_bps, 1_000_000.0);

    let (raw, smoothed) = expect_rate(s.apply(sample(at_ms(t, 13_000), 0, 2_000_050)));
    assert_eq!(raw.down_bps, 50.0);
    assert_eq!(smoothed.down_bps, raw.down_bps);
    assert_eq!(smoothed.up_bps, raw.up_bps);
}

#[test]
fn gap_exactly_at_limit_still_yields_a_rate() {
    let mut s = state();
    let t = base_time();
    s.apply(sample(t, 0, 0));
    let (raw, _) = expect_rate(s.apply(sample(at_ms(t, 10_000), 0, 1_000)));
    assert_eq!(raw.down_bps, 100.0);
}

#[test]
fn non_positive_elapsed_rebaselines() {
    let mut s = state();
    let t = at_ms(base_time(), 5_000);
    s.apply(sample(t, 0, 0));
    assert_eq!(
        s.apply(sample(t, 10, 10)),
        TickOutcome::Baseline {
            reason: GapReason::NonPositiveElapsed
        }
    );
    assert_eq!(
        s.apply(sample(at_ms(t, -1_000), 20, 20)),
        TickOutcome::Baseline {
            reason: GapReason::NonPositiveElapsed
        }
    );
    assert_eq!(s.last_sample(), Some(sample(at_ms(t, -1_000), 20, 20)));
}

#[test]
fn counter_reset_zeroes_only_the_regressed_direction() {
    let mut s = state();
    let t = base_time();
    s.apply(sample(t, 100, 9_000));

    let (raw, smoothed) = expect_rate(s.apply(sample(at_ms(t, 1000), 600, 10)));
    assert_eq!(raw.down_bps, 0.0);
    assert_eq!(raw.up_bps, 500.0);
    assert_eq!(smoothed.down_bps, 0.0);
    assert_eq!(smoothed.up_bps, 500.0);

    let bucket = *s.hourly().current();
    assert_eq!(bucket.count, 1);
    assert_eq!(bucket.down_sum, 0.0);
    assert_eq!(bucket.up_sum, 500.0);
}

#[test]
fn since_boot_tracks_every_sample_including_gaps() {
    let mut s = state();
    let t = base_time();
    s.apply(sample(t, 1_000, 5_000));
    s.apply(sample(at_ms(t, 60_000), 1_500, 9_000));
    assert_eq!(
        s.since_boot(),
        SinceBootTotals {
            down_bytes: 4_000,
            up_bytes: 500
        }
    );

    // Counter reset below the first sample saturates at zero.
    s.apply(sample(at_ms(t, 61_000), 10, 10));
    assert_eq!(s.since_boot(), SinceBootTotals::default());
    assert_eq!(s.initial_sample(), Some(sample(t, 1_000, 5_000)));
}

fn hub() -> Hub {
    Hub::spawn(HubConfig {
        subscriber_buffer: 8,
        queue_capacity: 32,
    })
    .0
}

#[tokio::test]
async fn probe_failure_leaves_state_untouched() {
    let (_dir, store) = temp_store().await;
    let source = Arc::new(ScriptedSource::new());
    source.push(Err(ProbeError::Unavailable("link down".into())));
    let monitor = Monitor::new(source.clone(), store, hub(), monitor_config());

    assert!(monitor.sample_once().await.is_err());
    assert_eq!(monitor.tick_counts().probe_failures, 1);
    assert_eq!(monitor.realtime_rate().await, RateSample::default());
    assert_eq!(monitor.since_boot().await, SinceBootTotals::default());
    assert_eq!(monitor.persist_once().await.unwrap(), None);

    let t = base_time();
    source.push(Ok(sample(t, 0, 0)));
    source.push(Ok(sample(at_ms(t, 1000), 0, 800)));
    assert!(matches!(
        monitor.sample_once().await.unwrap(),
        TickOutcome::Baseline { .. }
    ));
    assert!(matches!(
        monitor.sample_once().await.unwrap(),
        TickOutcome::Rate { .. }
    ));
    assert_eq!(monitor.realtime_rate().await.down_bps, 800.0);

    let counts = monitor.tick_counts();
    assert_eq!(counts.accepted, 1);
    assert_eq!(counts.skipped, 1);
    assert_eq!(counts.probe_failures, 1);
    assert_eq!(monitor.interface(), "eth0");
}

#[tokio::test]
async fn accepted_ticks_are_published_to_subscribers() {
    let (_dir, store) = temp_store().await;
    let monitor = Monitor::new(Arc::new(ScriptedSource::new()), store, hub(), monitor_config());
    let mut sub = monitor.subscribe().await.unwrap();

    let t = base_time();
    monitor.ingest(sample(t, 0, 0)).await;
    let (_, smoothed) = expect_rate(monitor.ingest(sample(at_ms(t, 1000), 300, 600)).await);

    assert_eq!(sub.recv().await, Some(smoothed));
    assert_eq!(smoothed.down_bps, 600.0);
    assert_eq!(smoothed.up_bps, 300.0);
}

#[tokio::test]
async fn hourly_stats_reflect_ingested_rates() {
    let (_dir, store) = temp_store().await;
    let monitor = Monitor::new(Arc::new(ScriptedSource::new()), store, hub(), monitor_config());
    let now = Utc::now();
    monitor.ingest(sample(now, 0, 0)).await;
    monitor.ingest(sample(at_ms(now, 1000), 0, 120)).await;

    let stats = monitor.hourly_stats().await;
    assert_eq!(stats.interval_min, 1);
    assert_eq!(stats.points.len(), 60);
    assert!(stats.points.iter().any(|p| p.down_bps == 120.0));
}

#[tokio::test]
async fn persist_and_stats_go_through_the_store() {
    let (_dir, store) = temp_store().await;
    let monitor = Monitor::new(
        Arc::new(ScriptedSource::new()),
        store.clone(),
        hub(),
        monitor_config(),
    );
    assert_eq!(monitor.persist_once().await.unwrap(), None);

    let now = Utc::now();
    monitor.ingest(sample(now, 100, 1_000)).await;
    assert_eq!(
        monitor.persist_once().await.unwrap(),
        Some(RecordOutcome::Created)
    );
    monitor.ingest(sample(at_ms(now, 1000), 150, 1_700)).await;
    assert_eq!(
        monitor.persist_once().await.unwrap(),
        Some(RecordOutcome::Updated)
    );

    let stats = monitor.stats().await.unwrap();
    assert_eq!(stats.since_boot.down_bytes, 700);
    assert_eq!(stats.since_boot.up_bytes, 50);
    let total_down: i64 = stats.daily.iter().map(|d| d.down_bytes).sum();
    assert_eq!(total_down, 700);

    store.close().await;
    assert!(monitor.stats().await.is_err());
    assert!(monitor.persist_once().await.is_err());
}
