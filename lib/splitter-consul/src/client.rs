//! Config entry and catalog access over the Consul HTTP API

use crate::ConsulConfig;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use splitter_api::{CatalogService, ConfigEntry, ConfigEntryKind, ConfigEntryVersion};
use splitter_core::{Catalog, ConfigStore, CoreError, Result};
use tracing::debug;

pub(crate) const TOKEN_HEADER: &str = "X-Consul-Token";

/// ConsulClient talks to one Consul server or agent for config entries and
/// catalog queries
#[derive(Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    datacenter: Option<String>,
}

impl ConsulClient {
    /// Create a new Consul client
    pub fn new(config: &ConsulConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            base_url: config.base_url(),
            token: config.token.clone(),
            datacenter: config.datacenter.clone(),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        if let Some(dc) = &self.datacenter {
            builder = builder.query(&[("dc", dc)]);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        builder
            .send()
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))
    }

    async fn write(&self, entry: &ConfigEntry, cas: Option<ConfigEntryVersion>) -> Result<bool> {
        let mut builder = self.request(Method::PUT, "/v1/config").json(entry);
        if let Some(version) = cas {
            builder = builder.query(&[("cas", version.0)]);
        }

        let response = check_status(self.send(builder).await?).await?;
        let accepted: bool = decode(response).await?;
        debug!(
            "Wrote {} {} (cas: {:?}) -> {}",
            entry.kind(),
            entry.name(),
            cas,
            accepted
        );
        Ok(accepted)
    }
}

#[async_trait]
impl ConfigStore for ConsulClient {
    async fn get(
        &self,
        kind: ConfigEntryKind,
        name: &str,
    ) -> Result<(ConfigEntry, ConfigEntryVersion)> {
        let path = format!("/v1/config/{}/{}", kind, name);
        let response = self.send(self.request(Method::GET, &path)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(CoreError::NotFound { kind, name: name.to_string() });
        }

        let value: serde_json::Value = decode(check_status(response).await?).await?;
        parse_entry(kind, name, value)
    }

    async fn set(&self, entry: &ConfigEntry) -> Result<bool> {
        self.write(entry, None).await
    }

    async fn compare_and_swap(
        &self,
        entry: &ConfigEntry,
        version: ConfigEntryVersion,
    ) -> Result<bool> {
        self.write(entry, Some(version)).await
    }
}

#[async_trait]
impl Catalog for ConsulClient {
    async fn datacenters(&self) -> Result<Vec<String>> {
        let response = self
            .send(self.request(Method::GET, "/v1/catalog/datacenters"))
            .await?;
        decode(check_status(response).await?).await
    }

    async fn service(&self, name: &str) -> Result<Vec<CatalogService>> {
        let path = format!("/v1/catalog/service/{}", name);
        let response = self.send(self.request(Method::GET, &path)).await?;
        decode(check_status(response).await?).await
    }
}

/// Split a fetched entry into the typed entry and its ModifyIndex
fn parse_entry(
    kind: ConfigEntryKind,
    name: &str,
    value: serde_json::Value,
) -> Result<(ConfigEntry, ConfigEntryVersion)> {
    let malformed = |reason: String| CoreError::Malformed {
        kind,
        name: name.to_string(),
        reason,
    };

    let version = value
        .get("ModifyIndex")
        .and_then(serde_json::Value::as_u64)
        .map(ConfigEntryVersion)
        .ok_or_else(|| malformed("missing ModifyIndex".to_string()))?;
    let entry: ConfigEntry =
        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

    Ok((entry, version))
}

pub(crate) fn build_http_client(config: &ConsulConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| CoreError::InvalidConfiguration(e.to_string()))
}

pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(CoreError::StoreUnavailable(format!(
        "{} returned {}: {}",
        url,
        status,
        body.trim()
    )))
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| CoreError::StoreUnavailable(format!("invalid response body: {}", e)))
}
