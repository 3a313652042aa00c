//! Identity triple a canary rollout is expressed against

use super::Canary;
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the apex service and its two variants, qualified by namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanaryTarget {
    pub namespace: String,
    pub apex: String,
    pub primary: String,
    pub canary: String,
}

impl CanaryTarget {
    /// Build a target from an apex name, using the `-primary`/`-canary`
    /// naming convention for the variants.
    pub fn new(namespace: impl Into<String>, apex: impl Into<String>) -> Self {
        let apex = apex.into();
        Self {
            namespace: namespace.into(),
            primary: format!("{}-primary", apex),
            canary: format!("{}-canary", apex),
            apex,
        }
    }

    /// Derive the target from a Canary resource.
    ///
    /// The apex name is the service name when set and non-empty, otherwise
    /// the target workload name.
    pub fn from_canary(canary: &Canary) -> Self {
        let apex = canary
            .spec
            .service
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&canary.spec.target_ref.name);
        let namespace = canary.namespace().unwrap_or_else(|| "default".to_string());
        Self::new(namespace, apex)
    }
}

impl fmt::Display for CanaryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.apex, self.namespace)
    }
}

impl From<&Canary> for CanaryTarget {
    fn from(canary: &Canary) -> Self {
        Self::from_canary(canary)
    }
}
