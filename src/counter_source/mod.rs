// Interface byte counters via sysfs (Linux) or sysinfo

mod linux;

use crate::models::CounterSample;
use chrono::Utc;
use std::sync::Mutex;
use sysinfo::Networks;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("interface '{0}' not found")]
    InterfaceNotFound(String),
    #[error("counter probe unavailable: {0}")]
    Unavailable(String),
    #[error("counter source lock poisoned")]
    LockPoisoned,
}

/// Reads the cumulative sent/received counters of one interface.
/// Blocking; the monitor calls it from `spawn_blocking`.
pub trait CounterSource: Send + Sync {
    fn read(&self, interface: &str) -> Result<CounterSample, ProbeError>;
}

pub struct SysinfoCounterSource {
    networks: Mutex<Networks>,
}

impl Default for SysinfoCounterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoCounterSource {
    pub fn new() -> Self {
        Self {
            networks: Mutex::new(Networks::new_with_refreshed_list()),
        }
    }

    /// Configured name if given, else the default-route interface, else the
    /// non-loopback interface that has moved the most bytes.
    pub fn resolve_interface(&self, configured: Option<&str>) -> Option<String> {
        if let Some(name) = configured {
            return Some(name.to_string());
        }
        if let Some(name) = linux::default_route_interface() {
            return Some(name);
        }
        let mut networks = self.networks.lock().ok()?;
        networks.refresh(true);
        networks
            .list()
            .iter()
            .filter(|(name, _)| !is_loopback(name))
            .max_by_key(|(_, data)| data.total_received().saturating_add(data.total_transmitted()))
            .map(|(name, _)| name.clone())
    }
}

impl CounterSource for SysinfoCounterSource {
    #[instrument(level = "debug", skip(self), fields(source = "sysinfo", operation = "read_counters"))]
    fn read(&self, interface: &str) -> Result<CounterSample, ProbeError> {
        let captured_at = Utc::now();
        if let Some((recv, sent)) = linux::read_sysfs_counters(interface) {
            return Ok(CounterSample::new(captured_at, sent, recv));
        }

        let mut networks = self.networks.lock().map_err(|_| ProbeError::LockPoisoned)?;
        networks.refresh(true);
        if networks.list().is_empty() {
            return Err(ProbeError::Unavailable("no network interfaces reported".into()));
        }
        let data = networks
            .list()
            .get(interface)
            .ok_or_else(|| ProbeError::InterfaceNotFound(interface.to_string()))?;
        Ok(CounterSample::new(
            captured_at,
            data.total_transmitted(),
            data.total_received(),
        ))
    }
}

fn is_loopback(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.eq_ignore_ascii_case("loopback")
}
