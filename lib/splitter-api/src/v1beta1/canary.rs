use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Canary describes a progressive rollout of a workload behind an apex service.
///
/// Only the fields the traffic splitter reads are modeled here; the
/// orchestrator that owns this resource carries the analysis and pacing
/// configuration.
#[derive(CustomResource, Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "flagger.app",
    version = "v1beta1",
    kind = "Canary",
    plural = "canaries",
    namespaced,
    derive = "Default",
    status = "CanaryStatus",
)]
#[serde(rename_all = "camelCase")]
pub struct CanarySpec {
    /// Workload being rolled out
    pub target_ref: TargetRef,

    /// Service exposing the workload
    #[serde(default)]
    pub service: CanaryService,

    /// Mesh provider handling traffic for this canary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Reference to the workload under rollout
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub name: String,
}

/// Service settings of a canary
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CanaryService {
    /// Apex service name (defaults to the target workload name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Container port exposed by the service
    #[serde(default)]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
}

/// Status of a Canary as reported by the orchestrator
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CanaryStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Traffic percentage currently routed to the canary
    #[serde(default)]
    pub canary_weight: u32,
}
