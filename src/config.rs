use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ports::{candidate_endpoints, default_ports};
use crate::types::Endpoint;

/// Tunables for one polling session. Every field has a default, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Host shared by all candidate endpoints.
    pub host: String,
    /// Candidate ports, in priority order.
    pub ports: Vec<u16>,
    /// Last known good endpoint; probed before the port list.
    pub preferred: Option<Endpoint>,
    /// Logical target tag sent with every pull.
    pub target: String,
    /// Cursor baseline for the first pull.
    pub since: u64,
    /// Pause between healthy iterations.
    pub poll_interval_ms: u64,
    /// Pause before retrying the same endpoint after a failed pull.
    pub retry_delay_ms: u64,
    /// Pause after a resolution pass that found nothing.
    pub rescan_delay_ms: u64,
    pub probe_timeout_ms: u64,
    /// Upper bound on one long-poll request.
    pub pull_timeout_ms: u64,
    /// Number of status lines kept for `status_log()`.
    pub status_log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ports: default_ports(),
            preferred: None,
            target: "owlbear".to_string(),
            since: 0,
            poll_interval_ms: 50,
            retry_delay_ms: 250,
            rescan_delay_ms: 500,
            probe_timeout_ms: 1_000,
            pull_timeout_ms: 30_000,
            status_log_capacity: 200,
        }
    }
}

impl SessionConfig {
    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let cfg: SessionConfig = serde_json::from_str(&content)
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }
        if self.ports.is_empty() && self.preferred.is_none() {
            bail!("no candidate endpoints: set ports or a preferred endpoint");
        }
        if self.target.trim().is_empty() {
            bail!("target tag must not be empty");
        }
        if self.probe_timeout_ms == 0 || self.pull_timeout_ms == 0 {
            bail!("timeouts must be greater than zero");
        }
        Ok(())
    }

    /// Ordered candidates: the preferred endpoint, then `host` on each port.
    pub fn candidates(&self) -> Vec<Endpoint> {
        candidate_endpoints(&self.host, &self.ports, self.preferred.as_ref())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn rescan_delay(&self) -> Duration {
        Duration::from_millis(self.rescan_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn pull_timeout(&self) -> Duration {
        Duration::from_millis(self.pull_timeout_ms)
    }
}
