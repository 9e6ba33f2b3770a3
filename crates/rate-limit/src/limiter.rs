use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use gatewarden_common::config::LimiterConfig;
use gatewarden_common::{Span, SpanLimits};
use tracing::{debug, trace};

use crate::quota::ClientQuota;

/// Occupancy of one span's window at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanOccupancy {
    pub span: Span,
    pub count: u64,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_ms: u64,
}

/// The outcome of a single admission check.
///
/// `occupancy` always carries all four spans, tightest first. When the
/// request was admitted the counts include the request itself.
#[derive(Debug, Clone)]
pub struct LimitDecision {
    pub admitted: bool,
    pub limiting_span: Option<Span>,
    pub retry_after_secs: Option<u64>,
    pub occupancy: Vec<SpanOccupancy>,
    pub reason: Option<String>,
}

impl LimitDecision {
    /// A fail-closed decision for malformed input. The caller must treat
    /// this as rate-limited, never as an error.
    fn denied(reason: &str) -> Self {
        Self {
            admitted: false,
            limiting_span: None,
            retry_after_secs: None,
            occupancy: Vec::new(),
            reason: Some(reason.to_string()),
        }
    }

    pub fn span(&self, span: Span) -> Option<&SpanOccupancy> {
        self.occupancy.iter().find(|o| o.span == span)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Multi-span sliding-window rate limiter keyed by client identity.
///
/// Client quotas live in a sharded [`DashMap`]: checks for different
/// clients proceed in parallel while the read-modify-write for a single
/// client serialises on its shard guard.
pub struct RateLimiter {
    quotas: DashMap<String, ClientQuota>,
    inactive: Duration,
    sweep: Duration,
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            quotas: DashMap::new(),
            inactive: Duration::from_secs(config.inactive_secs),
            sweep: Duration::from_secs(config.sweep_secs),
        }
    }

    /// Check whether a request for `client_key` fits inside `limits`, and
    /// record it if so.
    ///
    /// Admission requires room in every span simultaneously; a single full
    /// span rejects the request regardless of slack elsewhere. An admitted
    /// request is counted against all four windows exactly once.
    pub fn check_and_record(&self, client_key: &str, limits: &SpanLimits) -> LimitDecision {
        self.check_and_record_at(client_key, limits, now_ms())
    }

    /// Explicit-clock variant of [`check_and_record`](Self::check_and_record).
    pub fn check_and_record_at(
        &self,
        client_key: &str,
        limits: &SpanLimits,
        now_ms: u64,
    ) -> LimitDecision {
        if client_key.is_empty() {
            return LimitDecision::denied("missing client key");
        }

        let mut entry = self
            .quotas
            .entry(client_key.to_string())
            .or_insert_with(|| ClientQuota::new(*limits, now_ms));
        let quota = entry.value_mut();

        quota.set_limits(*limits);
        quota.touch(now_ms);
        quota.prune_all(now_ms);

        // Pick the limiting span among the violated ones: the span whose
        // oldest event takes longest to expire, i.e. the most restrictive
        // constraint, not merely the first full window.
        let mut limiting: Option<(Span, u64)> = None;
        for span in Span::ALL {
            let counter = quota.counter(span);
            if counter.count() >= limits.get(span) {
                let retry = counter.retry_after_secs(now_ms);
                if limiting.map_or(true, |(_, best)| retry > best) {
                    limiting = Some((span, retry));
                }
            }
        }

        let admitted = limiting.is_none();
        if admitted {
            quota.record_all(now_ms);
        }

        let occupancy: Vec<SpanOccupancy> = Span::ALL
            .iter()
            .map(|&span| {
                let counter = quota.counter(span);
                let limit = limits.get(span);
                SpanOccupancy {
                    span,
                    count: counter.count(),
                    limit,
                    remaining: limit.saturating_sub(counter.count()),
                    reset_at_ms: counter.reset_at_ms(now_ms),
                }
            })
            .collect();

        trace!(
            client = client_key,
            admitted,
            limiting = limiting.map(|(span, _)| span.as_str()),
            "admission check"
        );

        LimitDecision {
            admitted,
            limiting_span: limiting.map(|(span, _)| span),
            retry_after_secs: limiting.map(|(_, retry)| retry),
            occupancy,
            reason: None,
        }
    }

    /// Remove quotas that have been inactive past the threshold and carry
    /// no live history in any window. A quota with countable events is
    /// never evicted, regardless of inactivity.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(now_ms())
    }

    pub fn evict_idle_at(&self, now_ms: u64) -> usize {
        let inactive_ms = self.inactive.as_millis() as u64;
        let before = self.quotas.len();

        self.quotas.retain(|_key, quota| {
            quota.prune_all(now_ms);
            let idle = now_ms.saturating_sub(quota.last_activity_ms()) > inactive_ms;
            !(idle && quota.is_empty())
        });

        before - self.quotas.len()
    }

    pub fn active_clients(&self) -> usize {
        self.quotas.len()
    }

    /// Total live events per span across all clients, for the stats surface.
    pub fn occupancy_totals(&self) -> [(Span, u64); 4] {
        let now = now_ms();
        let mut totals = [0u64; 4];
        for mut entry in self.quotas.iter_mut() {
            let quota = entry.value_mut();
            quota.prune_all(now);
            for (i, span) in Span::ALL.iter().enumerate() {
                totals[i] += quota.counter(*span).count();
            }
        }
        [
            (Span::Second, totals[0]),
            (Span::Minute, totals[1]),
            (Span::Hour, totals[2]),
            (Span::Day, totals[3]),
        ]
    }

    /// Spawn a background thread that periodically evicts idle quotas.
    ///
    /// The sweep runs until the process exits and holds an `Arc` to the
    /// limiter, so the registry stays alive as long as the thread does.
    pub fn start_eviction_task(self: &Arc<Self>) {
        let limiter = Arc::clone(self);

        std::thread::Builder::new()
            .name("quota-eviction".into())
            .spawn(move || loop {
                std::thread::sleep(limiter.sweep);
                let evicted = limiter.evict_idle();
                debug!(
                    evicted,
                    remaining = limiter.quotas.len(),
                    "idle quota sweep complete"
                );
            })
            .expect("failed to spawn quota eviction thread");
    }
}
