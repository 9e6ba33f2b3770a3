use std::collections::HashSet;
use std::net::IpAddr;

use gatewarden_common::Policy;
use ipnet::IpNet;

/// A validator decides whether a candidate policy set may take effect.
/// The store runs it on every reload and again on every rollback target:
/// a snapshot that was valid when committed may fail a newer validator.
pub type Validator = Box<dyn Fn(&[Policy]) -> Result<(), Vec<String>> + Send + Sync>;

pub fn default_validator() -> Validator {
    Box::new(|policies| validate_policies(policies))
}

/// Schema and semantic checks on a candidate policy set. All problems are
/// collected, not just the first.
pub fn validate_policies(policies: &[Policy]) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    let mut seen_ids = HashSet::new();

    for (index, policy) in policies.iter().enumerate() {
        let label = if policy.id.is_empty() {
            format!("policy at index {index}")
        } else {
            format!("policy '{}'", policy.id)
        };

        if policy.id.is_empty() {
            errors.push(format!("{label} has an empty id"));
        } else if !seen_ids.insert(policy.id.as_str()) {
            errors.push(format!("duplicate policy id '{}'", policy.id));
        }

        if policy.criteria.is_empty() {
            errors.push(format!("{label} declares no match criteria"));
        }

        if policy.window_secs < 1 || policy.window_secs > 86_400 {
            errors.push(format!(
                "{label} has window_secs {} outside 1..=86400",
                policy.window_secs
            ));
        }

        if let Some(endpoint) = &policy.criteria.endpoint {
            if endpoint.is_empty() {
                errors.push(format!("{label} has an empty endpoint criterion"));
            }
        }

        if let Some(network) = &policy.criteria.network {
            let valid =
                network.parse::<IpNet>().is_ok() || network.parse::<IpAddr>().is_ok();
            if !valid {
                errors.push(format!("{label} has unparseable network '{network}'"));
            }
        }
    }

    // Policies with identical criteria and equal priority are
    // indistinguishable to the resolver; reject the collision outright.
    for (i, a) in policies.iter().enumerate() {
        for b in &policies[i + 1..] {
            if a.criteria == b.criteria && a.priority == b.priority {
                errors.push(format!(
                    "policies '{}' and '{}' have identical criteria and equal priority",
                    a.id, b.id
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
