//! Service-splitter reconciliation and weight accessors

use crate::resolver::{CANARY_SUBSET, PRIMARY_SUBSET};
use crate::{CoreError, MeshClients, Result};
use splitter_api::{
    CanaryTarget, ConfigEntry, ConfigEntryKind, ServiceSplit, ServiceSplitterConfigEntry,
};
use tracing::{debug, info};

/// Weights at or below this are left out of the splitter
pub const NEGLIGIBLE_WEIGHT: f32 = 0.001;

/// Traffic percentages for the two subsets, not normalized
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitWeights {
    pub primary: f32,
    pub canary: f32,
}

impl SplitWeights {
    pub fn new(primary: f32, canary: f32) -> Self {
        Self { primary, canary }
    }

    /// All traffic on the primary
    pub fn primary_only() -> Self {
        Self::new(100.0, 0.0)
    }
}

/// Build the splitter for a target, omitting negligible legs
pub fn build_splitter(target: &CanaryTarget, weights: SplitWeights) -> ServiceSplitterConfigEntry {
    let mut splits = Vec::new();
    for (subset, weight) in [(PRIMARY_SUBSET, weights.primary), (CANARY_SUBSET, weights.canary)] {
        if weight > NEGLIGIBLE_WEIGHT {
            splits.push(ServiceSplit {
                weight,
                service: target.apex.clone(),
                service_subset: subset.to_string(),
                ..Default::default()
            });
        }
    }

    ServiceSplitterConfigEntry {
        name: target.apex.clone(),
        splits,
        ..Default::default()
    }
}

/// Create the splitter at 100% primary if none exists yet.
///
/// Only a missing entry triggers the write; any other fetch error is
/// returned so a transient failure never resets weights mid-rollout.
pub async fn ensure_splitter_exists(mesh: &MeshClients, target: &CanaryTarget) -> Result<()> {
    match mesh.store.get(ConfigEntryKind::ServiceSplitter, &target.apex).await {
        Ok(_) => {
            debug!("Service splitter {} already exists", target);
            Ok(())
        }
        Err(e) if e.is_not_found() => set_weights(mesh, target, SplitWeights::primary_only()).await,
        Err(e) => Err(e.for_target("reading service splitter", target)),
    }
}

/// Overwrite the splitter with the given weights.
///
/// The caller holds the desired state, so this is a plain last-writer-wins
/// set rather than a compare-and-swap.
pub async fn set_weights(
    mesh: &MeshClients,
    target: &CanaryTarget,
    weights: SplitWeights,
) -> Result<()> {
    let entry = ConfigEntry::from(build_splitter(target, weights));
    let accepted = mesh
        .store
        .set(&entry)
        .await
        .map_err(|e| e.for_target("setting service splitter", target))?;

    if !accepted {
        return Err(CoreError::Rejected {
            kind: ConfigEntryKind::ServiceSplitter,
            name: target.apex.clone(),
        }
        .for_target("setting service splitter", target));
    }

    info!(
        "Service splitter {} set to primary={} canary={}",
        target, weights.primary, weights.canary
    );
    Ok(())
}

/// Read back the primary and canary weights of a target's splitter.
///
/// A splitter routing nothing to either subset is `CoreError::NoRoutes`.
pub async fn get_weights(mesh: &MeshClients, target: &CanaryTarget) -> Result<SplitWeights> {
    let (entry, _) = mesh
        .store
        .get(ConfigEntryKind::ServiceSplitter, &target.apex)
        .await
        .map_err(|e| e.for_target("reading service splitter", target))?;

    let splitter = match entry {
        ConfigEntry::ServiceSplitter(splitter) => splitter,
        other => {
            return Err(CoreError::Malformed {
                kind: ConfigEntryKind::ServiceSplitter,
                name: target.apex.clone(),
                reason: format!("store returned a {} entry", other.kind()),
            }
            .for_target("reading service splitter", target))
        }
    };

    let mut weights = SplitWeights::new(0.0, 0.0);
    for split in &splitter.splits {
        match split.service_subset.as_str() {
            PRIMARY_SUBSET => weights.primary += split.weight,
            CANARY_SUBSET => weights.canary += split.weight,
            _ => {}
        }
    }

    if weights.primary <= NEGLIGIBLE_WEIGHT && weights.canary <= NEGLIGIBLE_WEIGHT {
        return Err(CoreError::NoRoutes { target: target.to_string() });
    }

    Ok(weights)
}
