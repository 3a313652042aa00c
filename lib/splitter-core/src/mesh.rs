//! Control-plane capabilities the reconcilers are handed on every call

use crate::Result;
use async_trait::async_trait;
use splitter_api::{
    AgentCheck, AgentService, AgentServiceRegistration, CatalogService, ConfigEntry,
    ConfigEntryKind, ConfigEntryVersion,
};
use std::sync::Arc;

/// Versioned config entry store
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Fetch an entry and its version. A missing entry is `CoreError::NotFound`.
    async fn get(&self, kind: ConfigEntryKind, name: &str)
        -> Result<(ConfigEntry, ConfigEntryVersion)>;

    /// Unconditionally write an entry
    async fn set(&self, entry: &ConfigEntry) -> Result<bool>;

    /// Write an entry only if its stored version still equals `version`.
    /// A version mismatch is `Ok(false)`, never an error.
    async fn compare_and_swap(&self, entry: &ConfigEntry, version: ConfigEntryVersion)
        -> Result<bool>;
}

/// Cluster-wide catalog queries
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Known datacenters, the local one first
    async fn datacenters(&self) -> Result<Vec<String>>;

    /// Instances registered under a service name
    async fn service(&self, name: &str) -> Result<Vec<CatalogService>>;
}

/// Control endpoint of the agent running next to a service instance
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Current registration of a service, `None` if the agent does not know it
    async fn service(&self, service_id: &str) -> Result<Option<AgentService>>;

    /// Checks attached to a service
    async fn checks_for_service(&self, service_id: &str) -> Result<Vec<AgentCheck>>;

    /// Register a service, replacing any registration with the same ID
    async fn register(&self, registration: &AgentServiceRegistration) -> Result<()>;
}

/// Builds an agent client for a node address
pub type AgentFactory = Arc<dyn Fn(&str) -> Arc<dyn AgentClient> + Send + Sync>;

/// Handles to the control plane, passed explicitly into each reconcile call
#[derive(Clone)]
pub struct MeshClients {
    pub store: Arc<dyn ConfigStore>,
    pub catalog: Arc<dyn Catalog>,
    pub agents: AgentFactory,
}

impl MeshClients {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        catalog: Arc<dyn Catalog>,
        agents: AgentFactory,
    ) -> Self {
        Self { store, catalog, agents }
    }

    /// Agent client for the node at `address`
    pub fn agent(&self, address: &str) -> Arc<dyn AgentClient> {
        (self.agents)(address)
    }
}
