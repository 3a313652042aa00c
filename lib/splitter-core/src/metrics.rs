//! Prometheus metrics for reconciliation and route updates

use anyhow::Result;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics collector for the router
#[derive(Clone)]
pub struct RouterMetrics {
    /// Reconcile calls by result (ok / error)
    pub reconcile_total: CounterVec,
    /// Splitter writes made on behalf of SetRoutes
    pub route_updates_total: Counter,
    /// Compare-and-swap attempts that lost to a concurrent writer
    pub cas_conflicts_total: Counter,
    /// Sidecar registrations by kind (check / exposed_path)
    pub sidecar_registrations_total: CounterVec,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl RouterMetrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let reconcile_total = CounterVec::new(
            Opts::new("splitter_reconcile_total", "Total reconcile calls by result"),
            &["result"],
        )?;

        let route_updates_total = Counter::new(
            "splitter_route_updates_total",
            "Total service splitter weight updates",
        )?;

        let cas_conflicts_total = Counter::new(
            "splitter_cas_conflicts_total",
            "Total compare-and-swap version conflicts",
        )?;

        let sidecar_registrations_total = CounterVec::new(
            Opts::new(
                "splitter_sidecar_registrations_total",
                "Total sidecar re-registrations by kind",
            ),
            &["kind"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(route_updates_total.clone()))?;
        registry.register(Box::new(cas_conflicts_total.clone()))?;
        registry.register(Box::new(sidecar_registrations_total.clone()))?;

        Ok(Self {
            reconcile_total,
            route_updates_total,
            cas_conflicts_total,
            sidecar_registrations_total,
            registry,
        })
    }

    pub fn record_reconcile(&self, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.reconcile_total.with_label_values(&[result]).inc();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
