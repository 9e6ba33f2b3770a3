use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gatewarden_common::config::{LimiterConfig, TierConfig};
use gatewarden_common::{MatchCriteria, Policy, RequestDescriptor, Span, SpanLimits};
use gatewarden_engine::AdmissionEngine;
use gatewarden_rate_limit::RateLimiter;
use gatewarden_store::{ConfigStore, MemorySource};

fn tiers() -> TierConfig {
    let mut tiers = HashMap::new();
    tiers.insert(
        "free".to_string(),
        SpanLimits {
            per_second: 1,
            per_minute: 30,
            per_hour: 500,
            per_day: 5_000,
        },
    );
    tiers.insert(
        "premium".to_string(),
        SpanLimits {
            per_second: 50,
            per_minute: 1_000,
            per_hour: 10_000,
            per_day: 100_000,
        },
    );
    TierConfig {
        default_tier: "free".to_string(),
        tiers,
    }
}

fn engine_with(policies: Vec<Policy>) -> (AdmissionEngine, Arc<MemorySource>) {
    let source = Arc::new(MemorySource::new(policies));

    let store = Arc::new(ConfigStore::new(
        Box::new(Arc::clone(&source)),
        5,
    ));
    store.reload();

    let limiter = Arc::new(RateLimiter::new(&LimiterConfig {
        inactive_secs: 600,
        sweep_secs: 60,
    }));
    (AdmissionEngine::new(limiter, store, tiers()), source)
}

fn descriptor(endpoint: &str, client_key: &str, tier: &str) -> RequestDescriptor {
    RequestDescriptor {
        endpoint: endpoint.to_string(),
        client_key: client_key.to_string(),
        source_addr: "10.1.2.3".to_string(),
        tier: tier.to_string(),
    }
}

#[test]
fn free_tier_second_window_scenario() {
    let (engine, _) = engine_with(vec![]);
    let d = descriptor("/api/data", "client-1", "free");

    let first = engine.admit(&d);
    assert!(first.admitted);

    std::thread::sleep(Duration::from_millis(10));

    let second = engine.admit(&d);
    assert!(!second.admitted);
    assert_eq!(second.limiting_span, Some(Span::Second));
    assert!(second.retry_after_secs.unwrap() <= 1);
    assert_eq!(second.limit, 1);
    assert_eq!(second.remaining, 0);
}

#[test]
fn client_policy_outranks_endpoint_and_tier() {
    let (engine, _) = engine_with(vec![
        Policy {
            id: "k1-rule".into(),
            criteria: MatchCriteria {
                client_key: Some("k1".into()),
                ..Default::default()
            },
            limit: 1000,
            window_secs: 60,
            priority: 0,
        },
        Policy {
            id: "x-rule".into(),
            criteria: MatchCriteria {
                endpoint: Some("/x".into()),
                ..Default::default()
            },
            limit: 500,
            window_secs: 60,
            priority: 0,
        },
        Policy {
            id: "free-rule".into(),
            criteria: MatchCriteria {
                tier: Some("free".into()),
                ..Default::default()
            },
            limit: 100,
            window_secs: 60,
            priority: 0,
        },
    ]);

    let outcome = engine.admit(&descriptor("/x", "k1", "free"));
    assert!(outcome.admitted);
    assert_eq!(outcome.policy_id.as_deref(), Some("k1-rule"));
}

#[test]
fn resolved_policy_overrides_its_covering_span() {
    // Premium allows 1000/minute by default; the endpoint policy tightens
    // the minute window to 2.
    let (engine, _) = engine_with(vec![Policy {
        id: "tight".into(),
        criteria: MatchCriteria {
            endpoint: Some("/api/search".into()),
            ..Default::default()
        },
        limit: 2,
        window_secs: 60,
        priority: 0,
    }]);

    let d = descriptor("/api/search", "client-2", "premium");
    assert!(engine.admit(&d).admitted);
    assert!(engine.admit(&d).admitted);

    let third = engine.admit(&d);
    assert!(!third.admitted);
    assert_eq!(third.policy_id.as_deref(), Some("tight"));
    assert_eq!(third.limiting_span, Some(Span::Minute));
    assert_eq!(third.limit, 2);

    // A different endpoint for the same client is back on tier defaults,
    // but the client's windows already hold the two admitted events.
    let other = engine.admit(&descriptor("/api/other", "client-2", "premium"));
    assert!(other.admitted);
    assert!(other.policy_id.is_none());
}

#[test]
fn unknown_tier_falls_back_to_default_limits() {
    let (engine, _) = engine_with(vec![]);
    let d = descriptor("/api/data", "mystery", "no-such-tier");

    let first = engine.admit(&d);
    assert!(first.admitted);
    // Default tier is free: 1/second.
    let second = engine.admit(&d);
    assert!(!second.admitted);
    assert_eq!(second.limiting_span, Some(Span::Second));
}

#[test]
fn missing_client_key_fails_closed() {
    let (engine, _) = engine_with(vec![]);
    let outcome = engine.admit(&descriptor("/api/data", "", "free"));
    assert!(!outcome.admitted);
    assert_eq!(outcome.reason.as_deref(), Some("missing client key"));
    assert_eq!(outcome.retry_after_secs, None);
}

#[test]
fn reload_takes_effect_for_subsequent_requests() {
    let (engine, source) = engine_with(vec![]);
    let d = descriptor("/api/data", "k9", "premium");
    assert!(engine.admit(&d).admitted);

    // An operator ships a zero-limit policy for this client.
    source.set(vec![Policy {
        id: "blocked".into(),
        criteria: MatchCriteria {
            client_key: Some("k9".into()),
            ..Default::default()
        },
        limit: 0,
        window_secs: 1,
        priority: 0,
    }]);
    engine.store().reload();

    let outcome = engine.admit(&d);
    assert!(!outcome.admitted);
    assert_eq!(outcome.policy_id.as_deref(), Some("blocked"));

    // Other clients are untouched.
    assert!(engine.admit(&descriptor("/api/data", "k10", "premium")).admitted);
}

#[test]
fn stats_reflect_live_state() {
    let (engine, _) = engine_with(vec![]);
    engine.admit(&descriptor("/a", "c1", "premium"));
    engine.admit(&descriptor("/b", "c2", "premium"));

    let stats = engine.stats();
    assert_eq!(stats.active_clients, 2);
    assert_eq!(stats.snapshot_version, 1);
    assert!(stats.snapshot_healthy);
    assert_eq!(stats.policy_count, 0);
    let day_total = stats
        .span_occupancy
        .iter()
        .find(|(span, _)| *span == Span::Day)
        .map(|(_, events)| *events)
        .unwrap();
    assert_eq!(day_total, 2);
}
