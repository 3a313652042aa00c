//! Router configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{CoreError, Result};

/// Complete router configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    pub retry: RetryPolicy,
    pub sidecar_health: SidecarHealthConfig,
}

impl RouterConfig {
    /// Parse a YAML document; missing fields take their defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| CoreError::InvalidConfiguration(e.to_string()))
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }
}

/// Bounds on the compare-and-swap retry loop
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum compare-and-swap attempts before giving up
    pub max_attempts: u32,
    /// Backoff after the first conflict (ms)
    pub initial_backoff_ms: u64,
    /// Upper bound on a single backoff (ms)
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry_count` (0-based), doubling each
    /// time up to the cap, with up to 10% jitter
    pub fn backoff_duration(&self, retry_count: u32) -> Duration {
        let exponential = 2u64.saturating_pow(retry_count);
        let backoff_ms = self
            .initial_backoff_ms
            .saturating_mul(exponential)
            .min(self.max_backoff_ms);

        let jitter_range = backoff_ms / 10;
        let jitter = if jitter_range > 0 {
            rand::random::<u64>() % jitter_range
        } else {
            0
        };

        Duration::from_millis(backoff_ms + jitter)
    }
}

/// Sidecar health check and exposed path registration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SidecarHealthConfig {
    /// Run sidecar registration after resolver and splitter reconciliation
    pub enabled: bool,
    /// Proxy port the health path is exposed on
    pub listener_port: u16,
    pub path: String,
    pub protocol: String,
    /// Interval of the registered HTTP check, in agent duration syntax
    pub check_interval: String,
    /// Prefix of the check ID; the instance's service ID is appended
    pub check_id_prefix: String,
    /// Suffix appended to the apex name to find its sidecar proxies
    pub proxy_suffix: String,
}

impl Default for SidecarHealthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listener_port: 24999,
            path: "/healthz".to_string(),
            protocol: "http".to_string(),
            check_interval: "10s".to_string(),
            check_id_prefix: "canaryCheck:".to_string(),
            proxy_suffix: "-sidecar-proxy".to_string(),
        }
    }
}

impl SidecarHealthConfig {
    /// Catalog name of the sidecar proxies fronting `apex`
    pub fn proxy_name(&self, apex: &str) -> String {
        format!("{}{}", apex, self.proxy_suffix)
    }

    pub fn check_id(&self, service_id: &str) -> String {
        format!("{}{}", self.check_id_prefix, service_id)
    }
}
