//! Policy resolution by weighted-hierarchy scoring.
//!
//! Given a request's descriptors and the currently effective policy set,
//! [`resolve`] selects the single best-matching rate-limit policy. A policy
//! is a candidate only if every criterion it declares matches; criteria are
//! conjunctive, never best-effort. Candidates are ranked by an additive
//! score whose bands keep the hierarchy strictly ordered: a client-specific
//! rule always outranks an endpoint rule, which outranks a network rule,
//! which outranks a tier rule, no matter how many lower bands the loser
//! also matches.

pub mod matcher;

use gatewarden_common::{Policy, RequestDescriptor};
use tracing::trace;

use crate::matcher::{match_endpoint, match_network, EndpointMatch};

const SCORE_CLIENT_EXACT: i64 = 10_000;
const SCORE_ENDPOINT_EXACT: i64 = 1_000;
const SCORE_ENDPOINT_TEMPLATE: i64 = 500;
const SCORE_PLACEHOLDER_PENALTY: i64 = 10;
const SCORE_ENDPOINT_WILDCARD: i64 = 100;
const SCORE_NETWORK_BASE: i64 = 300;
const SCORE_TIER: i64 = 50;

/// A resolved policy together with the score that won it the match.
#[derive(Debug, Clone, Copy)]
pub struct PolicyMatch<'a> {
    pub policy: &'a Policy,
    pub score: i64,
}

/// Score a single policy against a descriptor, or `None` if any declared
/// criterion fails to match.
fn score_policy(policy: &Policy, descriptor: &RequestDescriptor) -> Option<i64> {
    let mut score = 0i64;

    if let Some(client_key) = &policy.criteria.client_key {
        if client_key != &descriptor.client_key {
            return None;
        }
        score += SCORE_CLIENT_EXACT;
    }

    if let Some(pattern) = &policy.criteria.endpoint {
        score += match match_endpoint(pattern, &descriptor.endpoint)? {
            EndpointMatch::Exact => SCORE_ENDPOINT_EXACT,
            EndpointMatch::Wildcard => SCORE_ENDPOINT_WILDCARD,
            EndpointMatch::Template(placeholders) => {
                SCORE_ENDPOINT_TEMPLATE - SCORE_PLACEHOLDER_PENALTY * i64::from(placeholders)
            }
        };
    }

    if let Some(network) = &policy.criteria.network {
        let prefix_len = match_network(network, &descriptor.source_addr)?;
        score += SCORE_NETWORK_BASE + i64::from(prefix_len);
    }

    if let Some(tier) = &policy.criteria.tier {
        if !tier.eq_ignore_ascii_case(&descriptor.tier) {
            return None;
        }
        score += SCORE_TIER;
    }

    Some(score)
}

/// Resolve the best-matching policy for a request.
///
/// The strictly highest score wins. Equal scores fall back to the policy's
/// declared priority, and equal priorities to first-declared order, so the
/// same `(descriptor, policies)` pair always resolves identically. Returns
/// `None` when no policy is a candidate; the caller applies its fail-safe
/// tier defaults, resolution itself never fails.
pub fn resolve<'a>(
    descriptor: &RequestDescriptor,
    policies: &'a [Policy],
) -> Option<PolicyMatch<'a>> {
    let mut best: Option<PolicyMatch<'a>> = None;

    for policy in policies {
        let Some(score) = score_policy(policy, descriptor) else {
            continue;
        };

        let better = match &best {
            None => true,
            Some(current) => {
                score > current.score
                    || (score == current.score && policy.priority > current.policy.priority)
            }
        };
        if better {
            best = Some(PolicyMatch { policy, score });
        }
    }

    if let Some(found) = &best {
        trace!(
            policy = %found.policy.id,
            score = found.score,
            endpoint = %descriptor.endpoint,
            "resolved policy"
        );
    }
    best
}
