//! Data model for the Consul Connect traffic splitter
//!
//! This library defines:
//! - Canary: the progressive-delivery resource a split is derived from
//! - CanaryTarget: the apex/primary/canary identity triple
//! - ConfigEntry: service-resolver and service-splitter config entries
//! - Catalog and agent types used for sidecar health registration

pub mod v1beta1;
pub mod consul;

pub use v1beta1::{Canary, CanaryTarget};
pub use consul::{
    AgentCheck, AgentService, AgentServiceCheck, AgentServiceRegistration, CatalogService,
    ConfigEntry, ConfigEntryKind, ConfigEntryVersion, ConnectProxyConfig, ExposeConfig,
    ExposePath, ServiceResolverConfigEntry, ServiceSplit, ServiceSplitterConfigEntry,
};
