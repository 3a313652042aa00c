//! Consul Connect traffic splitting for canary rollouts
//!
//! This library provides:
//! - Resolver reconciliation: primary/canary subsets with datacenter failover
//! - Splitter reconciliation and weight accessors
//! - Optimistic, version-checked config entry updates
//! - Optional sidecar health check and exposed path registration

pub mod config;
pub mod error;
pub mod mesh;
pub mod metrics;
pub mod resolver;
pub mod router;
pub mod sidecar;
pub mod splitter;
pub mod updater;

#[cfg(test)]
mod testing;

pub use config::{RetryPolicy, RouterConfig, SidecarHealthConfig};
pub use error::{CoreError, Result};
pub use mesh::{AgentClient, AgentFactory, Catalog, ConfigStore, MeshClients};
pub use metrics::RouterMetrics;
pub use router::{ConnectRouter, Router, Routes};
pub use sidecar::{RegistrationOutcome, SidecarHealthReconciler, SidecarReport};
pub use splitter::SplitWeights;
pub use updater::OptimisticUpdater;
