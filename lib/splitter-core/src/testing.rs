//! In-memory control plane used by the unit tests

use crate::{AgentClient, AgentFactory, Catalog, ConfigStore, CoreError, MeshClients, Result};
use async_trait::async_trait;
use splitter_api::{
    AgentCheck, AgentService, AgentServiceRegistration, CatalogService, ConfigEntry,
    ConfigEntryKind, ConfigEntryVersion,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(ConfigEntryKind, String), (ConfigEntry, u64)>>,
    index: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub set_calls: AtomicUsize,
    pub cas_calls: AtomicUsize,
    /// CAS calls that report a conflict before one is allowed through
    pub pending_conflicts: AtomicU32,
    pub unavailable: Mutex<Option<String>>,
    pub reject_sets: Mutex<bool>,
    pub datacenters: Mutex<Vec<String>>,
    pub datacenters_error: Mutex<Option<String>>,
    pub services: Mutex<HashMap<String, Vec<CatalogService>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        let store = Self::default();
        *store.datacenters.lock().unwrap() = vec!["dc1".to_string()];
        Arc::new(store)
    }

    pub fn insert(&self, entry: ConfigEntry) {
        let key = (entry.kind(), entry.name().to_string());
        self.insert_as(key.0, &key.1, entry);
    }

    /// Store `entry` under an arbitrary key, even one of another kind
    pub fn insert_as(&self, kind: ConfigEntryKind, name: &str, entry: ConfigEntry) {
        let index = self.index.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        self.entries
            .lock()
            .unwrap()
            .insert((kind, name.to_string()), (entry, index));
    }

    pub fn entry(&self, kind: ConfigEntryKind, name: &str) -> Option<ConfigEntry> {
        self.entries
            .lock()
            .unwrap()
            .get(&(kind, name.to_string()))
            .map(|(entry, _)| entry.clone())
    }

    pub fn set_datacenters(&self, dcs: &[&str]) {
        *self.datacenters.lock().unwrap() = dcs.iter().map(|dc| dc.to_string()).collect();
    }

    pub fn fail_with(&self, reason: &str) {
        *self.unavailable.lock().unwrap() = Some(reason.to_string());
    }

    fn check_available(&self) -> Result<()> {
        match self.unavailable.lock().unwrap().as_ref() {
            Some(reason) => Err(CoreError::StoreUnavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(
        &self,
        kind: ConfigEntryKind,
        name: &str,
    ) -> Result<(ConfigEntry, ConfigEntryVersion)> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.entries
            .lock()
            .unwrap()
            .get(&(kind, name.to_string()))
            .map(|(entry, index)| (entry.clone(), ConfigEntryVersion(*index)))
            .ok_or_else(|| CoreError::NotFound { kind, name: name.to_string() })
    }

    async fn set(&self, entry: &ConfigEntry) -> Result<bool> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if *self.reject_sets.lock().unwrap() {
            return Ok(false);
        }
        self.insert(entry.clone());
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        entry: &ConfigEntry,
        version: ConfigEntryVersion,
    ) -> Result<bool> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let conflicts = self.pending_conflicts.load(Ordering::SeqCst);
        if conflicts > 0 {
            self.pending_conflicts.store(conflicts - 1, Ordering::SeqCst);
            return Ok(false);
        }
        let current = self
            .entries
            .lock()
            .unwrap()
            .get(&(entry.kind(), entry.name().to_string()))
            .map(|(_, index)| *index);
        if current != Some(version.0) {
            return Ok(false);
        }
        self.insert(entry.clone());
        Ok(true)
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn datacenters(&self) -> Result<Vec<String>> {
        if let Some(reason) = self.datacenters_error.lock().unwrap().as_ref() {
            return Err(CoreError::StoreUnavailable(reason.clone()));
        }
        Ok(self.datacenters.lock().unwrap().clone())
    }

    async fn service(&self, name: &str) -> Result<Vec<CatalogService>> {
        self.check_available()?;
        Ok(self.services.lock().unwrap().get(name).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryAgent {
    pub services: Mutex<HashMap<String, AgentService>>,
    pub checks: Mutex<Vec<AgentCheck>>,
    pub registrations: Mutex<Vec<AgentServiceRegistration>>,
    pub register_calls: AtomicUsize,
    pub unreachable: Mutex<Option<String>>,
}

impl MemoryAgent {
    pub fn with_service(service: AgentService) -> Arc<Self> {
        let agent = Self::default();
        agent.services.lock().unwrap().insert(service.id.clone(), service);
        Arc::new(agent)
    }

    fn check_reachable(&self) -> Result<()> {
        match self.unreachable.lock().unwrap().as_ref() {
            Some(reason) => Err(CoreError::InstanceUnreachable {
                instance: "agent".to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AgentClient for MemoryAgent {
    async fn service(&self, service_id: &str) -> Result<Option<AgentService>> {
        self.check_reachable()?;
        Ok(self.services.lock().unwrap().get(service_id).cloned())
    }

    async fn checks_for_service(&self, service_id: &str) -> Result<Vec<AgentCheck>> {
        self.check_reachable()?;
        Ok(self
            .checks
            .lock()
            .unwrap()
            .iter()
            .filter(|check| check.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn register(&self, registration: &AgentServiceRegistration) -> Result<()> {
        self.check_reachable()?;
        self.register_calls.fetch_add(1, Ordering::SeqCst);

        let mut services = self.services.lock().unwrap();
        let service = services.entry(registration.id.clone()).or_default();
        service.id = registration.id.clone();
        service.service = registration.name.clone();
        service.kind = registration.kind.clone();
        service.port = registration.port;
        service.address = registration.address.clone();
        service.proxy = registration.proxy.clone();
        service.extra = registration.extra.clone();

        if let Some(check) = &registration.check {
            self.checks.lock().unwrap().push(AgentCheck {
                check_id: check.check_id.clone(),
                service_id: registration.id.clone(),
                definition: splitter_api::consul::CheckDefinition { http: check.http.clone() },
                ..Default::default()
            });
        }
        self.registrations.lock().unwrap().push(registration.clone());
        Ok(())
    }
}

/// Agent factory resolving addresses to the given agents; unknown
/// addresses get an agent that is unreachable
pub fn agent_factory(agents: Vec<(&str, Arc<MemoryAgent>)>) -> AgentFactory {
    let agents: HashMap<String, Arc<MemoryAgent>> = agents
        .into_iter()
        .map(|(address, agent)| (address.to_string(), agent))
        .collect();
    Arc::new(move |address: &str| -> Arc<dyn AgentClient> {
        match agents.get(address) {
            Some(agent) => agent.clone(),
            None => {
                let agent = MemoryAgent::default();
                *agent.unreachable.lock().unwrap() = Some(format!("no agent at {}", address));
                Arc::new(agent)
            }
        }
    })
}

pub fn mesh(store: &Arc<MemoryStore>, agents: AgentFactory) -> MeshClients {
    MeshClients::new(store.clone(), store.clone(), agents)
}
