//! Consul wire types used by the splitter

pub mod config_entry;
pub mod catalog;
pub mod agent;

pub use config_entry::{
    ConfigEntry, ConfigEntryKind, ConfigEntryVersion, ServiceResolverConfigEntry,
    ServiceResolverFailover, ServiceResolverSubset, ServiceSplit, ServiceSplitterConfigEntry,
    StoreIndexes,
};
pub use catalog::CatalogService;
pub use agent::{
    AgentCheck, AgentService, AgentServiceCheck, AgentServiceRegistration, AgentWeights,
    CheckDefinition, ConnectProxyConfig, ExposeConfig, ExposePath,
};
