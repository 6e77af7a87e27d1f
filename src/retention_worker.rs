// Background worker: drop daily rollups outside the retention window, then VACUUM.
// Runs on a cron schedule (local time) when configured, else at a fixed interval.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::daily_store::DailyStore;
use chrono::Local;
use tracing::{info, instrument, warn};

/// Config for the retention worker.
#[derive(Debug, Clone)]
pub struct RetentionWorkerConfig {
    pub retention_days: u32,
    /// Optional cron expression (e.g. "0 30 3 * * *" = 03:30 daily). Uses local time.
    pub prune_schedule: Option<String>,
    /// Prune every N seconds when prune_schedule is not set.
    pub prune_interval_secs: u64,
}

/// Spawns the retention worker. Returns a join handle.
pub fn spawn(store: Arc<DailyStore>, config: RetentionWorkerConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(store, config).await;
    })
}

#[instrument(skip(store), fields(retention_days = config.retention_days))]
async fn run(store: Arc<DailyStore>, config: RetentionWorkerConfig) {
    let (prune_tx, mut prune_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(prune_scheduler(config.clone(), prune_tx));

    while prune_rx.recv().await.is_some() {
        if let Err(e) = run_one_pass(&store, config.retention_days).await {
            warn!(error = %e, "retention pass failed");
        }
    }
}

/// Sends a message on `tx` at each prune time (cron or fixed interval). Uses local time for cron.
async fn prune_scheduler(config: RetentionWorkerConfig, tx: tokio::sync::mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.prune_schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid prune_schedule; retention pruning will not run");
            return;
        };
        loop {
            let now = Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.prune_interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}

/// Prunes rows older than `retention_days` (relative to today, local time) and
/// reclaims space when anything was removed. Returns the number of rows deleted.
pub async fn run_one_pass(store: &DailyStore, retention_days: u32) -> anyhow::Result<u64> {
    let today = Local::now().date_naive();
    let removed = store.prune_older_than(today, retention_days).await?;
    if removed > 0 {
        store.vacuum().await?;
        info!(rows_removed = removed, "retention pass complete");
    }
    Ok(removed)
}
