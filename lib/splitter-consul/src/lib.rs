//! Consul HTTP API integration
pub mod agent;
pub mod client;
pub mod config;

pub use agent::{agent_factory, AgentHttpClient};
pub use client::ConsulClient;
pub use config::ConsulConfig;

use splitter_core::{MeshClients, Result};
use std::sync::Arc;

/// Build the control-plane handles for a Consul cluster
pub fn mesh_clients(config: &ConsulConfig) -> Result<MeshClients> {
    let client = Arc::new(ConsulClient::new(config)?);
    Ok(MeshClients::new(
        client.clone(),
        client,
        agent_factory(config)?,
    ))
}
