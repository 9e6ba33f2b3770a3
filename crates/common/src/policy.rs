use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A fixed time span over which a request count is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Span {
    Second,
    Minute,
    Hour,
    Day,
}

impl Span {
    /// All spans, tightest first. Iteration order is load-bearing for
    /// deterministic reporting.
    pub const ALL: [Span; 4] = [Span::Second, Span::Minute, Span::Hour, Span::Day];

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.secs())
    }

    pub fn secs(&self) -> u64 {
        match self {
            Span::Second => 1,
            Span::Minute => 60,
            Span::Hour => 3_600,
            Span::Day => 86_400,
        }
    }

    pub fn millis(&self) -> u64 {
        self.secs() * 1_000
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Span::Second => "second",
            Span::Minute => "minute",
            Span::Hour => "hour",
            Span::Day => "day",
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-span request capacities for a single client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanLimits {
    pub per_second: u64,
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
}

impl SpanLimits {
    pub fn get(&self, span: Span) -> u64 {
        match span {
            Span::Second => self.per_second,
            Span::Minute => self.per_minute,
            Span::Hour => self.per_hour,
            Span::Day => self.per_day,
        }
    }

    pub fn set(&mut self, span: Span, limit: u64) {
        match span {
            Span::Second => self.per_second = limit,
            Span::Minute => self.per_minute = limit,
            Span::Hour => self.per_hour = limit,
            Span::Day => self.per_day = limit,
        }
    }
}

/// Match criteria for a rate-limit policy.
///
/// Every field is optional; a criterion that is absent means "don't care".
/// A policy whose criteria are all absent is invalid and rejected at
/// validation time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCriteria {
    /// Endpoint path, a `{param}`-style template, or the literal `*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Exact client key (API key or learned client identity).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    /// CIDR range or bare IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Service tier name, compared case-insensitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl MatchCriteria {
    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none()
            && self.client_key.is_none()
            && self.network.is_none()
            && self.tier.is_none()
    }
}

/// A single rate-limit rule.
///
/// Policies are immutable once part of a committed snapshot; an update
/// produces a new `Policy` value in a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    #[serde(flatten)]
    pub criteria: MatchCriteria,
    pub limit: u64,
    /// Window length in seconds, 1..=86400.
    pub window_secs: u32,
    #[serde(default)]
    pub priority: u32,
}

impl Policy {
    /// The smallest span whose duration covers `window_secs`. The policy's
    /// limit is enforced against this span's counter.
    pub fn covering_span(&self) -> Span {
        match u64::from(self.window_secs) {
            0..=1 => Span::Second,
            2..=60 => Span::Minute,
            61..=3_600 => Span::Hour,
            _ => Span::Day,
        }
    }
}

/// Per-request descriptors produced by client identification and consumed
/// once by policy resolution. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub endpoint: String,
    pub client_key: String,
    pub source_addr: String,
    pub tier: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_durations() {
        assert_eq!(Span::Second.duration(), Duration::from_secs(1));
        assert_eq!(Span::Minute.duration(), Duration::from_secs(60));
        assert_eq!(Span::Hour.duration(), Duration::from_secs(3600));
        assert_eq!(Span::Day.duration(), Duration::from_secs(86400));
    }

    #[test]
    fn span_limits_accessors() {
        let mut limits = SpanLimits {
            per_second: 1,
            per_minute: 2,
            per_hour: 3,
            per_day: 4,
        };
        for (i, span) in Span::ALL.iter().enumerate() {
            assert_eq!(limits.get(*span), (i + 1) as u64);
        }
        limits.set(Span::Hour, 30);
        assert_eq!(limits.get(Span::Hour), 30);
    }

    #[test]
    fn covering_span_boundaries() {
        let mut policy = Policy {
            id: "p".into(),
            criteria: MatchCriteria {
                tier: Some("free".into()),
                ..Default::default()
            },
            limit: 10,
            window_secs: 1,
            priority: 0,
        };
        assert_eq!(policy.covering_span(), Span::Second);
        policy.window_secs = 60;
        assert_eq!(policy.covering_span(), Span::Minute);
        policy.window_secs = 61;
        assert_eq!(policy.covering_span(), Span::Hour);
        policy.window_secs = 3600;
        assert_eq!(policy.covering_span(), Span::Hour);
        policy.window_secs = 86400;
        assert_eq!(policy.covering_span(), Span::Day);
    }

    #[test]
    fn policy_record_round_trip() {
        let yaml = r#"
- id: gold-client
  client_key: k-123
  limit: 1000
  window_secs: 60
  priority: 5
- id: search-endpoint
  endpoint: /api/search
  network: 10.0.0.0/8
  tier: free
  limit: 100
  window_secs: 1
"#;
        let policies: Vec<Policy> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].criteria.client_key.as_deref(), Some("k-123"));
        assert!(policies[0].criteria.endpoint.is_none());
        assert_eq!(policies[1].criteria.network.as_deref(), Some("10.0.0.0/8"));
        assert_eq!(policies[1].priority, 0);

        // Absent criteria must stay absent through a write/read cycle.
        let out = serde_yaml::to_string(&policies).unwrap();
        let reparsed: Vec<Policy> = serde_yaml::from_str(&out).unwrap();
        assert_eq!(reparsed, policies);
        assert!(!out.contains("client_key: null"));
    }

    #[test]
    fn empty_criteria_detected() {
        assert!(MatchCriteria::default().is_empty());
        let criteria = MatchCriteria {
            tier: Some("free".into()),
            ..Default::default()
        };
        assert!(!criteria.is_empty());
    }
}
