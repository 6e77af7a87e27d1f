use chrono::TimeDelta;
use serde::Deserialize;
use std::time::Duration;

/// Longest hourly bucket interval accepted (one day).
const MAX_BUCKET_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub hourly: HourlyConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Cron expression (local time) for pruning + VACUUM. Overrides prune_interval_secs.
    #[serde(default)]
    pub prune_schedule: Option<String>,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

fn default_retention_days() -> u32 {
    7
}

fn default_prune_interval_secs() -> u64 {
    24 * 60 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Interface to sample. When unset, the default-route interface is used.
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_persist_interval_secs")]
    pub persist_interval_secs: u64,
    /// Largest elapsed time between two samples that still yields a rate.
    #[serde(default = "default_max_gap_ms")]
    pub max_gap_ms: u64,
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    /// How often to log app stats (subscribers, samples, skipped ticks) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_persist_interval_secs() -> u64 {
    60
}

fn default_max_gap_ms() -> u64 {
    10_000
}

fn default_smoothing_window() -> usize {
    3
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct HourlyConfig {
    pub bucket_count: usize,
    pub bucket_interval_secs: u64,
}

impl Default for HourlyConfig {
    fn default() -> Self {
        Self {
            bucket_count: 60,
            bucket_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Per-subscriber outbox capacity; a subscriber whose outbox is full is dropped.
    pub subscriber_buffer: usize,
    /// Capacity of the hub's command queue (register/unregister/broadcast).
    pub hub_queue_capacity: usize,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 16,
            hub_queue_capacity: 256,
        }
    }
}

impl MonitoringConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    pub fn max_gap(&self) -> Duration {
        Duration::from_millis(self.max_gap_ms)
    }
}

impl HourlyConfig {
    /// Only meaningful on a validated config (at most one day).
    pub fn bucket_interval(&self) -> TimeDelta {
        TimeDelta::seconds(self.bucket_interval_secs.min(MAX_BUCKET_INTERVAL_SECS) as i64)
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            (1..=7).contains(&self.database.retention_days),
            "database.retention_days must be between 1 and 7, got {}",
            self.database.retention_days
        );
        anyhow::ensure!(
            self.database.prune_interval_secs > 0,
            "database.prune_interval_secs must be > 0, got {}",
            self.database.prune_interval_secs
        );
        if let Some(schedule) = &self.database.prune_schedule {
            anyhow::ensure!(
                schedule.parse::<cron::Schedule>().is_ok(),
                "database.prune_schedule is not a valid cron expression: {:?}",
                schedule
            );
        }
        if let Some(interface) = &self.monitoring.interface {
            anyhow::ensure!(
                !interface.trim().is_empty(),
                "monitoring.interface must be non-empty when set"
            );
        }
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.persist_interval_secs > 0,
            "monitoring.persist_interval_secs must be > 0, got {}",
            self.monitoring.persist_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.max_gap_ms > self.monitoring.sample_interval_ms,
            "monitoring.max_gap_ms must exceed sample_interval_ms ({}), got {}",
            self.monitoring.sample_interval_ms,
            self.monitoring.max_gap_ms
        );
        anyhow::ensure!(
            self.monitoring.smoothing_window > 0,
            "monitoring.smoothing_window must be > 0, got {}",
            self.monitoring.smoothing_window
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.hourly.bucket_count > 0,
            "hourly.bucket_count must be > 0, got {}",
            self.hourly.bucket_count
        );
        anyhow::ensure!(
            self.hourly.bucket_interval_secs > 0 && self.hourly.bucket_interval_secs % 60 == 0,
            "hourly.bucket_interval_secs must be a positive multiple of 60, got {}",
            self.hourly.bucket_interval_secs
        );
        anyhow::ensure!(
            self.hourly.bucket_interval_secs <= MAX_BUCKET_INTERVAL_SECS,
            "hourly.bucket_interval_secs must be at most {}, got {}",
            MAX_BUCKET_INTERVAL_SECS,
            self.hourly.bucket_interval_secs
        );
        anyhow::ensure!(
            self.publishing.subscriber_buffer > 0,
            "publishing.subscriber_buffer must be > 0, got {}",
            self.publishing.subscriber_buffer
        );
        anyhow::ensure!(
            self.publishing.hub_queue_capacity > 0,
            "publishing.hub_queue_capacity must be > 0, got {}",
            self.publishing.hub_queue_capacity
        );
        Ok(())
    }
}
