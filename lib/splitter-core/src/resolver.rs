//! Service-resolver reconciliation: primary/canary subsets and failover

use crate::{CoreError, MeshClients, Result};
use splitter_api::consul::{ServiceResolverFailover, ServiceResolverSubset};
use splitter_api::{CanaryTarget, ConfigEntry, ConfigEntryKind, ServiceResolverConfigEntry};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Subset receiving traffic for the stable variant
pub const PRIMARY_SUBSET: &str = "primary";
/// Subset receiving traffic for the variant under test
pub const CANARY_SUBSET: &str = "canary";

/// Pattern matching the service IDs of primary instances
pub fn primary_id_pattern(target: &CanaryTarget) -> String {
    format!("{}-.*", target.primary)
}

/// Filter expression selecting instances whose service ID matches (or,
/// when `negate` is set, does not match) `pattern`
pub fn id_filter(pattern: &str, negate: bool) -> String {
    let operator = if negate { "not matches" } else { "matches" };
    format!("Service.ID {} \"{}\"", operator, pattern)
}

/// Failover datacenters: every known datacenter but the first, which is
/// the local one
pub fn failover_datacenters(datacenters: &[String]) -> Vec<String> {
    datacenters.iter().skip(1).cloned().collect()
}

/// Build the resolver for a target given the known datacenters
pub fn build_resolver(target: &CanaryTarget, datacenters: &[String]) -> ServiceResolverConfigEntry {
    let pattern = primary_id_pattern(target);

    let mut subsets = BTreeMap::new();
    subsets.insert(
        PRIMARY_SUBSET.to_string(),
        ServiceResolverSubset {
            filter: id_filter(&pattern, false),
            ..Default::default()
        },
    );
    subsets.insert(
        CANARY_SUBSET.to_string(),
        ServiceResolverSubset {
            filter: id_filter(&pattern, true),
            ..Default::default()
        },
    );

    let remote = failover_datacenters(datacenters);
    let mut failover = BTreeMap::new();
    if !remote.is_empty() {
        for subset in [PRIMARY_SUBSET, CANARY_SUBSET] {
            failover.insert(
                subset.to_string(),
                ServiceResolverFailover {
                    service: target.apex.clone(),
                    service_subset: subset.to_string(),
                    datacenters: remote.clone(),
                    ..Default::default()
                },
            );
        }
    }

    ServiceResolverConfigEntry {
        name: target.apex.clone(),
        default_subset: PRIMARY_SUBSET.to_string(),
        subsets,
        failover,
        ..Default::default()
    }
}

/// Write the resolver for a target, overwriting any existing one.
///
/// Failing to list datacenters only drops the failover section.
pub async fn ensure_resolver(mesh: &MeshClients, target: &CanaryTarget) -> Result<()> {
    let datacenters = match mesh.catalog.datacenters().await {
        Ok(datacenters) => datacenters,
        Err(e) => {
            warn!("Failed to fetch datacenter list for {}: {}", target, e);
            Vec::new()
        }
    };
    debug!("Datacenters for {}: {:?}", target, datacenters);

    let entry = ConfigEntry::from(build_resolver(target, &datacenters));
    let accepted = mesh
        .store
        .set(&entry)
        .await
        .map_err(|e| e.for_target("creating service resolver", target))?;

    if !accepted {
        return Err(CoreError::Rejected {
            kind: ConfigEntryKind::ServiceResolver,
            name: target.apex.clone(),
        }
        .for_target("creating service resolver", target));
    }

    info!("Service resolver {} reconciled", target);
    Ok(())
}
