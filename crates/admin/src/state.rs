use std::sync::Arc;

use gatewarden_engine::AdmissionEngine;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AdminState>;

/// Central admin state holding the engine handle and metrics.
pub struct AdminState {
    pub engine: Arc<AdmissionEngine>,
    pub metrics: GatewayMetrics,
    pub start_time: std::time::Instant,
}

/// Prometheus metrics collected by the gateway.
pub struct GatewayMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub requests_admitted: IntCounter,
    pub requests_rejected: IntCounter,
    pub reloads_total: IntCounterVec,
    pub rollbacks_total: IntCounterVec,
}

impl GatewayMetrics {
    /// Create a new metrics instance with all counters registered against
    /// a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "gatewarden_requests_total",
            "Total number of requests checked for admission",
        ))
        .expect("failed to create requests_total counter");

        let requests_admitted = IntCounter::with_opts(Opts::new(
            "gatewarden_requests_admitted",
            "Total number of requests admitted",
        ))
        .expect("failed to create requests_admitted counter");

        let requests_rejected = IntCounter::with_opts(Opts::new(
            "gatewarden_requests_rejected",
            "Total number of requests rejected or throttled",
        ))
        .expect("failed to create requests_rejected counter");

        let reloads_total = IntCounterVec::new(
            Opts::new(
                "gatewarden_reloads_total",
                "Policy reload attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("failed to create reloads_total counter");

        let rollbacks_total = IntCounterVec::new(
            Opts::new(
                "gatewarden_rollbacks_total",
                "Policy rollback attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("failed to create rollbacks_total counter");

        registry
            .register(Box::new(requests_total.clone()))
            .expect("failed to register requests_total");
        registry
            .register(Box::new(requests_admitted.clone()))
            .expect("failed to register requests_admitted");
        registry
            .register(Box::new(requests_rejected.clone()))
            .expect("failed to register requests_rejected");
        registry
            .register(Box::new(reloads_total.clone()))
            .expect("failed to register reloads_total");
        registry
            .register(Box::new(rollbacks_total.clone()))
            .expect("failed to register rollbacks_total");

        Self {
            registry,
            requests_total,
            requests_admitted,
            requests_rejected,
            reloads_total,
            rollbacks_total,
        }
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminState {
    pub fn new(engine: Arc<AdmissionEngine>) -> Self {
        Self {
            engine,
            metrics: GatewayMetrics::new(),
            start_time: std::time::Instant::now(),
        }
    }
}
