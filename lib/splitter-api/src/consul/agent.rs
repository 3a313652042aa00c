//! Local agent view of a service registration

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields the agent reports on reads but rejects or ignores on register
const READ_ONLY_FIELDS: &[&str] = &["ContentHash", "Datacenter"];

/// A service as currently registered with its node's agent.
///
/// Fields this model does not name (socket path, locality, partition) are
/// kept in `extra` and carried into re-registrations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentService {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(rename = "ID")]
    pub id: String,

    pub service: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub meta: BTreeMap<String, String>,

    #[serde(default)]
    pub port: u16,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub tagged_addresses: BTreeMap<String, Value>,

    #[serde(default)]
    pub weights: AgentWeights,

    #[serde(default)]
    pub enable_tag_override: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ConnectProxyConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentWeights {
    pub passing: u32,
    pub warning: u32,
}

impl Default for AgentWeights {
    fn default() -> Self {
        Self { passing: 1, warning: 1 }
    }
}

/// Sidecar proxy settings of a registration.
///
/// Fields this model does not name (upstreams, mode, opaque proxy config)
/// are kept in `extra` so a re-registration writes them back unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectProxyConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_service_name: String,

    #[serde(rename = "DestinationServiceID", default, skip_serializing_if = "String::is_empty")]
    pub destination_service_id: String,

    #[serde(default)]
    pub local_service_port: u16,

    #[serde(default)]
    pub expose: ExposeConfig,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Paths the proxy exposes without mTLS, typically for health probes
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExposeConfig {
    #[serde(default)]
    pub checks: bool,

    #[serde(default)]
    pub paths: Vec<ExposePath>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExposePath {
    pub listener_port: u16,
    pub path: String,
    pub local_path_port: u16,
    #[serde(default)]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parsed_from_check: bool,
}

impl ExposePath {
    /// Whether both paths expose the same route: listener port, path,
    /// local port and protocol all agree.
    pub fn same_route(&self, other: &ExposePath) -> bool {
        self.listener_port == other.listener_port
            && self.path == other.path
            && self.local_path_port == other.local_path_port
            && self.protocol == other.protocol
    }
}

/// A check as listed by the agent
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentCheck {
    #[serde(default)]
    pub node: String,

    #[serde(rename = "CheckID")]
    pub check_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub status: String,

    #[serde(rename = "ServiceID", default)]
    pub service_id: String,

    #[serde(default)]
    pub definition: CheckDefinition,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckDefinition {
    #[serde(rename = "HTTP", default)]
    pub http: String,
}

/// A check to attach to a registration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceCheck {
    #[serde(rename = "CheckID")]
    pub check_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    pub interval: String,

    #[serde(rename = "HTTP")]
    pub http: String,
}

/// Full service registration sent to an agent; replaces any existing
/// registration with the same ID
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceRegistration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(rename = "ID")]
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub port: u16,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tagged_addresses: BTreeMap<String, Value>,

    #[serde(default)]
    pub enable_tag_override: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<AgentWeights>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<AgentServiceCheck>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ConnectProxyConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl From<&AgentService> for AgentServiceRegistration {
    fn from(service: &AgentService) -> Self {
        Self {
            kind: service.kind.clone(),
            id: service.id.clone(),
            name: service.service.clone(),
            tags: service.tags.clone(),
            port: service.port,
            address: service.address.clone(),
            tagged_addresses: service.tagged_addresses.clone(),
            enable_tag_override: service.enable_tag_override,
            meta: service.meta.clone(),
            weights: Some(service.weights.clone()),
            check: None,
            proxy: service.proxy.clone(),
            connect: service.connect.clone(),
            namespace: service.namespace.clone(),
            extra: service
                .extra
                .iter()
                .filter(|(key, _)| !READ_ONLY_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}
