//! Connection settings for the Consul HTTP API

use std::time::Duration;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8500";
const DEFAULT_AGENT_PORT: u16 = 8500;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Consul connection configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ConsulConfig {
    /// host:port of the server or agent used for config entries and catalog
    pub address: String,
    /// http or https
    pub scheme: String,
    /// ACL token sent as X-Consul-Token
    pub token: Option<String>,
    /// Datacenter to query instead of the agent's own
    pub datacenter: Option<String>,
    /// HTTP port of the per-node agents
    pub agent_port: u16,
    /// Timeout applied to every request
    pub timeout: Duration,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            scheme: "http".to_string(),
            token: None,
            datacenter: None,
            agent_port: DEFAULT_AGENT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ConsulConfig {
    /// Read the standard CONSUL_* environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("CONSUL_HTTP_ADDR").filter(|v| !v.is_empty()) {
            match addr.split_once("://") {
                Some((scheme, rest)) => {
                    config.scheme = scheme.to_string();
                    config.address = rest.trim_end_matches('/').to_string();
                }
                None => config.address = addr,
            }
        }

        if let Some(ssl) = lookup("CONSUL_HTTP_SSL") {
            if matches!(ssl.to_ascii_lowercase().as_str(), "1" | "true") {
                config.scheme = "https".to_string();
            }
        }

        config.token = lookup("CONSUL_HTTP_TOKEN").filter(|v| !v.is_empty());
        config.datacenter = lookup("CONSUL_DATACENTER").filter(|v| !v.is_empty());

        if let Some(port) = lookup("CONSUL_AGENT_PORT").and_then(|v| v.parse().ok()) {
            config.agent_port = port;
        }
        if let Some(secs) = lookup("CONSUL_HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Base URL of the configured server or agent
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.address)
    }

    /// Base URL of the agent running on the node at `node_address`
    pub fn agent_url(&self, node_address: &str) -> String {
        format!("{}://{}:{}", self.scheme, node_address, self.agent_port)
    }
}
