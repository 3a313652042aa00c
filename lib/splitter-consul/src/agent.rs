//! Per-node agent endpoint used for sidecar registration

use crate::client::{build_http_client, check_status, decode, TOKEN_HEADER};
use crate::ConsulConfig;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use splitter_api::{AgentCheck, AgentService, AgentServiceRegistration};
use splitter_core::{AgentClient, AgentFactory, CoreError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Client for the agent running on one node
#[derive(Clone)]
pub struct AgentHttpClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl AgentHttpClient {
    pub fn new(http: reqwest::Client, base_url: String, token: Option<String>) -> Self {
        Self { http, base_url, token }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        builder.send().await.map_err(|e| self.unreachable(e.to_string()))
    }

    fn unreachable(&self, reason: String) -> CoreError {
        CoreError::InstanceUnreachable {
            instance: self.base_url.clone(),
            reason,
        }
    }
}

#[async_trait]
impl AgentClient for AgentHttpClient {
    async fn service(&self, service_id: &str) -> Result<Option<AgentService>> {
        let path = format!("/v1/agent/service/{}", service_id);
        let response = self.send(self.request(Method::GET, &path)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let service = decode(check_status(response).await?).await?;
        Ok(Some(service))
    }

    async fn checks_for_service(&self, service_id: &str) -> Result<Vec<AgentCheck>> {
        let filter = format!("ServiceID == \"{}\"", service_id);
        let builder = self
            .request(Method::GET, "/v1/agent/checks")
            .query(&[("filter", filter.as_str())]);
        let response = self.send(builder).await?;
        let checks: HashMap<String, AgentCheck> = decode(check_status(response).await?).await?;
        debug!("{} has {} checks on {}", service_id, checks.len(), self.base_url);
        Ok(checks.into_values().collect())
    }

    async fn register(&self, registration: &AgentServiceRegistration) -> Result<()> {
        let builder = self
            .request(Method::PUT, "/v1/agent/service/register")
            .json(registration);
        check_status(self.send(builder).await?).await?;
        debug!("Registered {} on {}", registration.id, self.base_url);
        Ok(())
    }
}

/// Agent factory addressing each node's agent on the configured agent port,
/// sharing one connection pool
pub fn agent_factory(config: &ConsulConfig) -> Result<AgentFactory> {
    let http = build_http_client(config)?;
    let config = config.clone();
    Ok(Arc::new(move |address: &str| -> Arc<dyn AgentClient> {
        Arc::new(AgentHttpClient::new(
            http.clone(),
            config.agent_url(address),
            config.token.clone(),
        ))
    }))
}
