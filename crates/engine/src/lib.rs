//! The admission engine: the façade request handling talks to.
//!
//! Per request: resolve the best-matching policy against the current
//! snapshot, build the effective per-span limits (tier defaults overlaid
//! with the resolved policy), and ask the rate limiter whether the request
//! fits. Resolution and the check are synchronous and touch no I/O; only
//! reloads and eviction ever leave the hot path.

use std::sync::Arc;

use gatewarden_common::config::TierConfig;
use gatewarden_common::{RequestDescriptor, Span, SpanLimits};
use gatewarden_rate_limit::RateLimiter;
use gatewarden_store::ConfigStore;
use tracing::trace;

/// What request handling needs to answer a single inbound request:
/// the verdict plus the numbers for `X-RateLimit-*` headers and 429
/// bodies.
#[derive(Debug, Clone)]
pub struct AdmissionOutcome {
    pub admitted: bool,
    /// The resolved policy, if any matched; `None` means the tier
    /// defaults acted as the fail-safe.
    pub policy_id: Option<String>,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_unix_secs: u64,
    pub retry_after_secs: Option<u64>,
    pub limiting_span: Option<Span>,
    /// Set when the descriptor was unusable and the request was refused
    /// outright (fail closed).
    pub reason: Option<String>,
}

/// Live statistics for the admin surface.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub active_clients: usize,
    pub snapshot_version: u64,
    pub snapshot_healthy: bool,
    pub policy_count: usize,
    pub span_occupancy: [(Span, u64); 4],
}

pub struct AdmissionEngine {
    limiter: Arc<RateLimiter>,
    store: Arc<ConfigStore>,
    tiers: TierConfig,
}

impl AdmissionEngine {
    pub fn new(limiter: Arc<RateLimiter>, store: Arc<ConfigStore>, tiers: TierConfig) -> Self {
        Self {
            limiter,
            store,
            tiers,
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Decide whether to admit a request, and record it if admitted.
    pub fn admit(&self, descriptor: &RequestDescriptor) -> AdmissionOutcome {
        let snapshot = self.store.current();
        let resolved = gatewarden_policy::resolve(descriptor, &snapshot.policies);

        // Tier defaults are the floor and the fail-safe when nothing
        // matches; a resolved policy overrides the span its window covers.
        let mut limits: SpanLimits = self.tiers.limits_for(&descriptor.tier);
        let policy_id = resolved.map(|found| {
            limits.set(found.policy.covering_span(), found.policy.limit);
            found.policy.id.clone()
        });

        let decision = self
            .limiter
            .check_and_record(&descriptor.client_key, &limits);

        trace!(
            endpoint = %descriptor.endpoint,
            admitted = decision.admitted,
            policy = policy_id.as_deref(),
            "admission decision"
        );

        // Header numbers come from the limiting span on rejection, and
        // from the tightest remaining span on admission.
        let report = match decision.limiting_span {
            Some(span) => decision.span(span).copied(),
            None => decision.occupancy.iter().min_by_key(|o| o.remaining).copied(),
        };

        match report {
            Some(occupancy) => AdmissionOutcome {
                admitted: decision.admitted,
                policy_id,
                limit: occupancy.limit,
                remaining: occupancy.remaining,
                reset_at_unix_secs: (occupancy.reset_at_ms + 999) / 1_000,
                retry_after_secs: decision.retry_after_secs,
                limiting_span: decision.limiting_span,
                reason: decision.reason,
            },
            // No occupancy at all: the descriptor was unusable and the
            // limiter failed closed.
            None => AdmissionOutcome {
                admitted: false,
                policy_id,
                limit: 0,
                remaining: 0,
                reset_at_unix_secs: 0,
                retry_after_secs: None,
                limiting_span: None,
                reason: decision.reason,
            },
        }
    }

    pub fn stats(&self) -> EngineStats {
        let snapshot = self.store.current();
        EngineStats {
            active_clients: self.limiter.active_clients(),
            snapshot_version: snapshot.version,
            snapshot_healthy: snapshot.healthy,
            policy_count: snapshot.policies.len(),
            span_occupancy: self.limiter.occupancy_totals(),
        }
    }
}
