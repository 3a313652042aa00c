//! Resolving the canary target from the command line or the cluster

use anyhow::{Context, Result};
use clap::Args;
use kube::{Api, Client};
use splitter_api::v1beta1::{API_GROUP, API_VERSION};
use splitter_api::{Canary, CanaryTarget};
use tracing::debug;

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Namespace of the canary
    #[arg(long, short = 'n', default_value = "default", global = true)]
    pub namespace: String,

    /// Apex service name; variants are <apex>-primary and <apex>-canary
    #[arg(long, conflicts_with = "canary", required_unless_present = "canary")]
    pub apex: Option<String>,

    /// Read the target from this Canary resource in the cluster
    #[arg(long)]
    pub canary: Option<String>,
}

impl TargetArgs {
    pub async fn resolve(&self) -> Result<CanaryTarget> {
        if let Some(apex) = &self.apex {
            return Ok(CanaryTarget::new(self.namespace.clone(), apex.clone()));
        }

        let name = self.canary.as_deref().context("either --apex or --canary is required")?;
        let client = Client::try_default().await.context("connecting to Kubernetes")?;
        let canaries: Api<Canary> = Api::namespaced(client, &self.namespace);
        let canary = canaries
            .get(name)
            .await
            .with_context(|| {
                format!(
                    "fetching {}/{} canary {}/{}",
                    API_GROUP, API_VERSION, self.namespace, name
                )
            })?;

        let target = CanaryTarget::from_canary(&canary);
        debug!("Canary {}/{} targets {:?}", self.namespace, name, target);
        Ok(target)
    }
}
