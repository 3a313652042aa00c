//! Consul Connect driver of the canary router interface

use crate::resolver::ensure_resolver;
use crate::splitter::{ensure_splitter_exists, get_weights, set_weights, SplitWeights};
use crate::{
    MeshClients, OptimisticUpdater, Result, RouterConfig, RouterMetrics, SidecarHealthReconciler,
};
use async_trait::async_trait;
use splitter_api::{CanaryTarget, ConfigEntry, ConfigEntryKind};
use tracing::{debug, info, warn};

/// Traffic weights as seen by the rollout orchestrator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Routes {
    pub primary_weight: u32,
    pub canary_weight: u32,
    pub mirrored: bool,
}

impl Routes {
    pub fn new(primary_weight: u32, canary_weight: u32) -> Self {
        Self {
            primary_weight,
            canary_weight,
            mirrored: false,
        }
    }
}

/// Expresses primary/canary traffic weights against a service mesh
#[async_trait]
pub trait Router: Send + Sync {
    /// Converge all mesh objects of a target; safe to call repeatedly
    async fn reconcile(&self, mesh: &MeshClients, target: &CanaryTarget) -> Result<()>;

    /// Current weights of a target
    async fn get_routes(&self, mesh: &MeshClients, target: &CanaryTarget) -> Result<Routes>;

    /// Route traffic according to `routes`
    async fn set_routes(
        &self,
        mesh: &MeshClients,
        target: &CanaryTarget,
        routes: Routes,
    ) -> Result<()>;
}

/// Router backed by Consul service-resolver and service-splitter entries
#[derive(Clone)]
pub struct ConnectRouter {
    config: RouterConfig,
    updater: OptimisticUpdater,
    sidecar: SidecarHealthReconciler,
    metrics: Option<RouterMetrics>,
}

impl ConnectRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            updater: OptimisticUpdater::new(config.retry.clone()),
            sidecar: SidecarHealthReconciler::new(config.sidecar_health.clone()),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: RouterMetrics) -> Self {
        self.updater = self.updater.with_metrics(metrics.clone());
        self.sidecar = self.sidecar.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Read-modify-write a config entry without clobbering concurrent
    /// writers; see [`OptimisticUpdater::update_with_retry`]
    pub async fn update_config_entry<F>(
        &self,
        mesh: &MeshClients,
        kind: ConfigEntryKind,
        name: &str,
        mutate: F,
    ) -> Result<()>
    where
        F: FnMut(&mut ConfigEntry) -> Result<bool> + Send,
    {
        self.updater
            .update_with_retry(&*mesh.store, kind, name, mutate)
            .await
    }

    async fn converge(&self, mesh: &MeshClients, target: &CanaryTarget) -> Result<()> {
        ensure_resolver(mesh, target).await?;
        ensure_splitter_exists(mesh, target).await?;

        if self.config.sidecar_health.enabled {
            self.sidecar.reconcile(mesh, target).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Router for ConnectRouter {
    async fn reconcile(&self, mesh: &MeshClients, target: &CanaryTarget) -> Result<()> {
        info!("Reconciling {}", target);
        let result = self.converge(mesh, target).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_reconcile(result.is_ok());
        }
        result
    }

    async fn get_routes(&self, mesh: &MeshClients, target: &CanaryTarget) -> Result<Routes> {
        let weights = get_weights(mesh, target).await?;
        let routes = Routes::new(
            weights.primary.round() as u32,
            weights.canary.round() as u32,
        );
        debug!(
            "Routes for {}: primary={} canary={}",
            target, routes.primary_weight, routes.canary_weight
        );
        Ok(routes)
    }

    async fn set_routes(
        &self,
        mesh: &MeshClients,
        target: &CanaryTarget,
        routes: Routes,
    ) -> Result<()> {
        if routes.mirrored {
            warn!("Traffic mirroring is not supported by Consul Connect, ignoring for {}", target);
        }

        let weights = SplitWeights::new(routes.primary_weight as f32, routes.canary_weight as f32);
        set_weights(mesh, target, weights).await?;

        if let Some(metrics) = &self.metrics {
            metrics.route_updates_total.inc();
        }
        Ok(())
    }
}
