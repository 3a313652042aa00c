//! Service-resolver and service-splitter config entries

//!
//! Every struct keeps the fields it does not model in `extra`, so an entry
//! read from the store and written back loses nothing set by other writers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Discriminator of a config entry in the store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigEntryKind {
    ServiceResolver,
    ServiceSplitter,
}

impl ConfigEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigEntryKind::ServiceResolver => "service-resolver",
            ConfigEntryKind::ServiceSplitter => "service-splitter",
        }
    }
}

impl fmt::Display for ConfigEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque version token of a fetched entry, required for compare-and-swap
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigEntryVersion(pub u64);

impl fmt::Display for ConfigEntryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A config entry, tagged by its `Kind` field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Kind")]
pub enum ConfigEntry {
    #[serde(rename = "service-resolver")]
    ServiceResolver(ServiceResolverConfigEntry),
    #[serde(rename = "service-splitter")]
    ServiceSplitter(ServiceSplitterConfigEntry),
}

impl ConfigEntry {
    pub fn kind(&self) -> ConfigEntryKind {
        match self {
            ConfigEntry::ServiceResolver(_) => ConfigEntryKind::ServiceResolver,
            ConfigEntry::ServiceSplitter(_) => ConfigEntryKind::ServiceSplitter,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ConfigEntry::ServiceResolver(entry) => &entry.name,
            ConfigEntry::ServiceSplitter(entry) => &entry.name,
        }
    }
}

impl From<ServiceResolverConfigEntry> for ConfigEntry {
    fn from(entry: ServiceResolverConfigEntry) -> Self {
        ConfigEntry::ServiceResolver(entry)
    }
}

impl From<ServiceSplitterConfigEntry> for ConfigEntry {
    fn from(entry: ServiceSplitterConfigEntry) -> Self {
        ConfigEntry::ServiceSplitter(entry)
    }
}

/// Maps a service name to named subsets and optional failover targets
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceResolverConfigEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_subset: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subsets: BTreeMap<String, ServiceResolverSubset>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failover: BTreeMap<String, ServiceResolverFailover>,

    #[serde(flatten)]
    pub indexes: StoreIndexes,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Partition of a service's instances selected by a filter expression
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceResolverSubset {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filter: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub only_passing: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Where to send a subset's traffic when no local instance is healthy
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceResolverFailover {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_subset: String,

    /// Datacenters to try, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datacenters: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Distributes traffic for a service across subsets by weight
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSplitterConfigEntry {
    pub name: String,

    #[serde(default)]
    pub splits: Vec<ServiceSplit>,

    #[serde(flatten)]
    pub indexes: StoreIndexes,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One weighted leg of a splitter
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSplit {
    /// Percentage of traffic (0-100)
    pub weight: f32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_subset: String,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Raft indexes the store reports on reads. They are never written back;
/// the version for compare-and-swap travels as [`ConfigEntryVersion`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreIndexes {
    #[serde(default, skip_serializing)]
    pub create_index: u64,

    #[serde(default, skip_serializing)]
    pub modify_index: u64,
}
