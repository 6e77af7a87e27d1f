// Background loops: the sampler (probe, rates, hub publish) and the persister
// (latest raw sample -> daily store). They run as separate tasks so store I/O
// never delays a sampling tick.

use super::Monitor;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

/// Rate limit for repeated probe-failure warnings (the interface may stay down for a while).
const PROBE_WARN_INTERVAL: Duration = Duration::from_secs(60);

pub struct SamplerConfig {
    pub sample_interval: Duration,
    /// How often to log app stats (real seconds).
    pub stats_log_interval: Duration,
}

pub struct PersisterConfig {
    pub persist_interval: Duration,
}

/// Shutdown signal shared by the loops; send `true` (or drop the sender) to stop them.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub fn spawn_sampler(
    monitor: Arc<Monitor>,
    config: SamplerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let span = tracing::debug_span!("sampler", interface = monitor.interface());
    tokio::spawn(run_sampler(monitor, config, shutdown_rx).instrument(span))
}

async fn run_sampler(
    monitor: Arc<Monitor>,
    config: SamplerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut tick = interval(config.sample_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut stats_log_tick = interval(config.stats_log_interval);
    stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last_probe_warn: Option<Instant> = None;
    let mut probe_failing = false;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match monitor.sample_once().await {
                    Ok(_) => {
                        if probe_failing {
                            tracing::info!(operation = "read_counters", "counter probe recovered");
                            probe_failing = false;
                        }
                    }
                    Err(e) => {
                        probe_failing = true;
                        let should_warn = last_probe_warn
                            .is_none_or(|t| t.elapsed() >= PROBE_WARN_INTERVAL);
                        if should_warn {
                            tracing::warn!(
                                error = %e,
                                operation = "read_counters",
                                "counter probe failed; tick skipped"
                            );
                            last_probe_warn = Some(Instant::now());
                        } else {
                            tracing::debug!(error = %e, operation = "read_counters", "counter probe failed");
                        }
                    }
                }
            }
            _ = stats_log_tick.tick() => {
                let counts = monitor.tick_counts();
                tracing::info!(
                    ws_clients = monitor.hub().subscriber_count(),
                    broadcasts_dropped = monitor.hub().dropped_broadcasts(),
                    samples_accepted = counts.accepted,
                    ticks_skipped = counts.skipped,
                    probe_failures = counts.probe_failures,
                    "app stats"
                );
            }
            _ = shutdown_rx.changed() => {
                tracing::debug!("Sampler shutting down");
                break;
            }
        }
    }
}

/// Hands the latest raw sample to the daily store every `persist_interval`
/// (first write immediately). Failures are logged and retried next tick.
/// Writes once more on shutdown.
pub fn spawn_persister(
    monitor: Arc<Monitor>,
    config: PersisterConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(config.persist_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => persist(&monitor).await,
                _ = shutdown_rx.changed() => break,
            }
        }
        persist(&monitor).await;
        tracing::debug!("Persister shutting down");
    })
}

async fn persist(monitor: &Monitor) {
    match monitor.persist_once().await {
        Ok(Some(outcome)) => {
            tracing::debug!(operation = "record_sample", ?outcome, "daily rollup updated");
        }
        Ok(None) => {
            tracing::debug!(operation = "record_sample", "no sample yet; nothing persisted");
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                operation = "record_sample",
                "Failed to persist sample; retrying next interval"
            );
        }
    }
}
