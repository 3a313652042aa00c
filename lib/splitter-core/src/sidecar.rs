//! Sidecar proxy health check and exposed path registration
//!
//! Each sidecar proxy of the apex service gets an HTTP health check and an
//! exposed `/healthz` path on its local agent. Both are idempotent: the
//! agent is asked for the current state first and nothing is registered if
//! an equivalent check or path exists.
//!
//! Registrations are full replaces. The agent API has no compare-and-set
//! for service definitions, so a change made to the same registration
//! between our fetch and our register is overwritten.

use crate::{AgentClient, CoreError, MeshClients, Result, RouterMetrics, SidecarHealthConfig};
use splitter_api::{
    AgentServiceCheck, AgentServiceRegistration, CanaryTarget, CatalogService, ExposePath,
};
use tracing::{debug, info, warn};

/// Result of registering a check or path on one instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The registration was replaced to include the check or path
    Registered,
    /// An equivalent check or path was already present
    AlreadyPresent,
    /// The agent does not know the sidecar yet
    NotRegisteredYet,
    /// The catalog lacks what is needed to build the registration
    Skipped,
}

/// Tally of one sidecar reconciliation pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SidecarReport {
    pub registered: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SidecarReport {
    fn record(&mut self, instance: &CatalogService, what: &str, result: Result<RegistrationOutcome>) {
        match result {
            Ok(RegistrationOutcome::Registered) => self.registered += 1,
            Ok(RegistrationOutcome::AlreadyPresent) => self.unchanged += 1,
            Ok(RegistrationOutcome::NotRegisteredYet) | Ok(RegistrationOutcome::Skipped) => {
                self.skipped += 1
            }
            Err(e) => {
                warn!("Failed to reconcile {} for {}: {}", what, instance.service_id, e);
                self.failed += 1;
            }
        }
    }
}

/// Registers health checks and exposed paths on sidecar proxies
#[derive(Clone)]
pub struct SidecarHealthReconciler {
    config: SidecarHealthConfig,
    metrics: Option<RouterMetrics>,
}

impl SidecarHealthReconciler {
    pub fn new(config: SidecarHealthConfig) -> Self {
        Self { config, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: RouterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &SidecarHealthConfig {
        &self.config
    }

    /// Check to attach to an instance's registration. The probe goes to the
    /// service address, or to the node address when the service has none.
    pub fn check_for(&self, instance: &CatalogService) -> AgentServiceCheck {
        let host = if instance.service_address.is_empty() {
            &instance.address
        } else {
            &instance.service_address
        };
        AgentServiceCheck {
            check_id: self.config.check_id(&instance.service_id),
            name: String::new(),
            interval: self.config.check_interval.clone(),
            http: format!(
                "http://{}:{}{}",
                host, self.config.listener_port, self.config.path
            ),
        }
    }

    /// Path to expose on an instance's proxy, `None` when the catalog does
    /// not say which local port the service listens on
    pub fn exposed_path_for(&self, instance: &CatalogService) -> Option<ExposePath> {
        let proxy = instance.service_proxy.as_ref()?;
        Some(ExposePath {
            listener_port: self.config.listener_port,
            path: self.config.path.clone(),
            local_path_port: proxy.local_service_port,
            protocol: self.config.protocol.clone(),
            parsed_from_check: false,
        })
    }

    /// Register the check and the exposed path on every sidecar proxy of the
    /// target. Failures are logged per instance and never returned.
    pub async fn reconcile(&self, mesh: &MeshClients, target: &CanaryTarget) -> SidecarReport {
        let proxy_name = self.config.proxy_name(&target.apex);
        let instances = match mesh.catalog.service(&proxy_name).await {
            Ok(instances) => instances,
            Err(e) => {
                warn!("Failed to list sidecar proxies {} for {}: {}", proxy_name, target, e);
                return SidecarReport::default();
            }
        };
        debug!("Found {} sidecar proxies for {}", instances.len(), target);

        let mut report = SidecarReport::default();
        for instance in &instances {
            let agent = mesh.agent(&instance.address);
            let outcome = self.register_check(&*agent, instance).await;
            report.record(instance, "health check", outcome);
            let outcome = self.register_exposed_path(&*agent, instance).await;
            report.record(instance, "exposed path", outcome);
        }

        info!(
            "Sidecar health for {}: {} registered, {} unchanged, {} skipped, {} failed",
            target, report.registered, report.unchanged, report.skipped, report.failed
        );
        report
    }

    /// Attach the health check to the instance's registration unless a
    /// check with the same ID exists
    pub async fn register_check(
        &self,
        agent: &dyn AgentClient,
        instance: &CatalogService,
    ) -> Result<RegistrationOutcome> {
        let check = self.check_for(instance);

        let service = match agent
            .service(&instance.service_id)
            .await
            .map_err(instance_error(instance))?
        {
            Some(service) => service,
            None => {
                info!("Sidecar proxy {} is not registered yet", instance.service_id);
                return Ok(RegistrationOutcome::NotRegisteredYet);
            }
        };

        let checks = agent
            .checks_for_service(&instance.service_id)
            .await
            .map_err(instance_error(instance))?;
        if checks.iter().any(|existing| existing.check_id == check.check_id) {
            debug!("{} already has check {}", instance.service_id, check.check_id);
            return Ok(RegistrationOutcome::AlreadyPresent);
        }

        info!("Adding check {} ({}) to {}", check.check_id, check.http, instance.service_id);
        let mut registration = AgentServiceRegistration::from(&service);
        registration.check = Some(check);
        agent.register(&registration).await.map_err(instance_error(instance))?;

        self.count_registration("check");
        Ok(RegistrationOutcome::Registered)
    }

    /// Append the exposed path to the instance's proxy config unless an
    /// equivalent path exists
    pub async fn register_exposed_path(
        &self,
        agent: &dyn AgentClient,
        instance: &CatalogService,
    ) -> Result<RegistrationOutcome> {
        let path = match self.exposed_path_for(instance) {
            Some(path) => path,
            None => {
                warn!("{} has no proxy config in the catalog", instance.service_id);
                return Ok(RegistrationOutcome::Skipped);
            }
        };

        let mut service = match agent
            .service(&instance.service_id)
            .await
            .map_err(instance_error(instance))?
        {
            Some(service) => service,
            None => {
                info!("Sidecar proxy {} is not registered yet", instance.service_id);
                return Ok(RegistrationOutcome::NotRegisteredYet);
            }
        };

        let mut proxy = service.proxy.take().unwrap_or_default();
        if proxy.expose.paths.iter().any(|existing| existing.same_route(&path)) {
            debug!("{} already exposes {}", instance.service_id, path.path);
            return Ok(RegistrationOutcome::AlreadyPresent);
        }

        info!("Exposing {} on port {} for {}", path.path, path.listener_port, instance.service_id);
        proxy.expose.paths.push(path);
        service.proxy = Some(proxy);

        let registration = AgentServiceRegistration::from(&service);
        agent.register(&registration).await.map_err(instance_error(instance))?;

        self.count_registration("exposed_path");
        Ok(RegistrationOutcome::Registered)
    }

    fn count_registration(&self, kind: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.sidecar_registrations_total.with_label_values(&[kind]).inc();
        }
    }
}

fn instance_error(instance: &CatalogService) -> impl Fn(CoreError) -> CoreError + '_ {
    move |e| CoreError::InstanceUnreachable {
        instance: format!("{} at {}", instance.service_id, instance.address),
        reason: e.to_string(),
    }
}
