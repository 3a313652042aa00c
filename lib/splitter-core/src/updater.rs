//! Version-checked read-modify-write of config entries

use crate::{ConfigStore, CoreError, Result, RetryPolicy, RouterMetrics};
use splitter_api::{ConfigEntry, ConfigEntryKind};
use tracing::{debug, info, warn};

/// Applies a mutation to a stored config entry, retrying against freshly
/// fetched state whenever a concurrent writer wins the compare-and-swap.
#[derive(Clone)]
pub struct OptimisticUpdater {
    policy: RetryPolicy,
    metrics: Option<RouterMetrics>,
}

impl OptimisticUpdater {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: RouterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Fetch the entry, let `mutate` edit it in place and write it back with
    /// compare-and-swap.
    ///
    /// `mutate` returns `Ok(false)` when no write is needed. Fetch errors,
    /// mutate errors and non-conflict write errors are returned as is; only a
    /// version conflict restarts from the fetch, at most `max_attempts` times.
    pub async fn update_with_retry<F>(
        &self,
        store: &dyn ConfigStore,
        kind: ConfigEntryKind,
        name: &str,
        mut mutate: F,
    ) -> Result<()>
    where
        F: FnMut(&mut ConfigEntry) -> Result<bool> + Send,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let (mut entry, version) = store.get(kind, name).await?;
            if entry.kind() != kind {
                return Err(CoreError::Malformed {
                    kind,
                    name: name.to_string(),
                    reason: format!("store returned a {} entry", entry.kind()),
                });
            }

            if !mutate(&mut entry)? {
                debug!("{} {} already up to date", kind, name);
                return Ok(());
            }
            if entry.kind() != kind || entry.name() != name {
                return Err(CoreError::Malformed {
                    kind,
                    name: name.to_string(),
                    reason: format!("update renamed entry to {} {}", entry.kind(), entry.name()),
                });
            }

            attempt += 1;
            if store.compare_and_swap(&entry, version).await? {
                info!("Updated {} {} at version {}", kind, name, version);
                return Ok(());
            }

            if let Some(metrics) = &self.metrics {
                metrics.cas_conflicts_total.inc();
            }
            if attempt >= max_attempts {
                return Err(CoreError::ConflictExhausted {
                    kind,
                    name: name.to_string(),
                    attempts: attempt,
                });
            }

            let backoff = self.policy.backoff_duration(attempt - 1);
            warn!(
                "Version conflict updating {} {} (attempt {}/{}), retrying in {:?}",
                kind, name, attempt, max_attempts, backoff
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use splitter_api::{ServiceSplit, ServiceSplitterConfigEntry};
    use std::sync::atomic::Ordering;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    fn seeded_store() -> std::sync::Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.insert(ConfigEntry::from(ServiceSplitterConfigEntry {
            name: "checkout".to_string(),
            splits: vec![ServiceSplit {
                weight: 100.0,
                service: "checkout".to_string(),
                service_subset: "primary".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }));
        store
    }

    fn add_canary_split(entry: &mut ConfigEntry) -> Result<bool> {
        match entry {
            ConfigEntry::ServiceSplitter(splitter) => {
                splitter.splits.push(ServiceSplit {
                    weight: 0.0,
                    service: "checkout".to_string(),
                    service_subset: "canary".to_string(),
                    ..Default::default()
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    #[tokio::test]
    async fn test_single_conflict_refetches_once() {
        let store = seeded_store();
        store.pending_conflicts.store(1, Ordering::SeqCst);
        let updater = OptimisticUpdater::new(fast_policy(5));

        updater
            .update_with_retry(&*store, ConfigEntryKind::ServiceSplitter, "checkout", add_canary_split)
            .await
            .unwrap();

        assert_eq!(store.get_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.cas_calls.load(Ordering::SeqCst), 2);
        match store.entry(ConfigEntryKind::ServiceSplitter, "checkout").unwrap() {
            ConfigEntry::ServiceSplitter(splitter) => assert_eq!(splitter.splits.len(), 2),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_write_needed() {
        let store = seeded_store();
        let updater = OptimisticUpdater::new(fast_policy(5));

        updater
            .update_with_retry(&*store, ConfigEntryKind::ServiceSplitter, "checkout", |_| Ok(false))
            .await
            .unwrap();

        assert_eq!(store.get_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.cas_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_retried() {
        let store = MemoryStore::new();
        let updater = OptimisticUpdater::new(fast_policy(5));

        let err = updater
            .update_with_retry(&*store, ConfigEntryKind::ServiceSplitter, "checkout", |_| Ok(true))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mutate_error_is_returned() {
        let store = seeded_store();
        let updater = OptimisticUpdater::new(fast_policy(5));

        let err = updater
            .update_with_retry(&*store, ConfigEntryKind::ServiceSplitter, "checkout", |_| {
                Err(CoreError::InvalidConfiguration("refused".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidConfiguration(_)));
        assert_eq!(store.cas_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_conflicts_exhaust_attempts() {
        let store = seeded_store();
        store.pending_conflicts.store(10, Ordering::SeqCst);
        let metrics = RouterMetrics::new().unwrap();
        let updater = OptimisticUpdater::new(fast_policy(3)).with_metrics(metrics.clone());

        let err = updater
            .update_with_retry(&*store, ConfigEntryKind::ServiceSplitter, "checkout", add_canary_split)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::ConflictExhausted { attempts: 3, .. }));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.cas_conflicts_total.get(), 3.0);
    }

    #[tokio::test]
    async fn test_write_error_is_returned() {
        let store = seeded_store();
        let updater = OptimisticUpdater::new(fast_policy(5));
        let failing = store.clone();

        let err = updater
            .update_with_retry(&*store, ConfigEntryKind::ServiceSplitter, "checkout", move |entry| {
                failing.fail_with("leader lost");
                add_canary_split(entry)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::StoreUnavailable(_)));
        assert_eq!(store.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_renaming_entry_is_rejected() {
        let store = seeded_store();
        let updater = OptimisticUpdater::new(fast_policy(5));

        let err = updater
            .update_with_retry(&*store, ConfigEntryKind::ServiceSplitter, "checkout", |entry| {
                if let ConfigEntry::ServiceSplitter(splitter) = entry {
                    splitter.name = "payments".to_string();
                }
                Ok(true)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Malformed { .. }));
        assert_eq!(store.cas_calls.load(Ordering::SeqCst), 0);
    }
}
