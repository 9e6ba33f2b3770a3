use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::policy::SpanLimits;

/// Built-in fallback applied when a request's tier resolves to nothing at
/// all, including the default tier being misconfigured away. Deliberately
/// the most conservative limits in the system.
pub const FALLBACK_LIMITS: SpanLimits = SpanLimits {
    per_second: 1,
    per_minute: 10,
    per_hour: 100,
    per_day: 1_000,
};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Path to the policy record file watched and rewritten by the store.
    pub policy_file: PathBuf,
    #[serde(default)]
    pub tiers: TierConfig,
    #[serde(default)]
    pub limiter: LimiterConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub clients: ClientsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_listen")]
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen: default_admin_listen(),
        }
    }
}

/// Named service classes with their default quota limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_tier_name")]
    pub default_tier: String,
    #[serde(default = "default_tiers")]
    pub tiers: HashMap<String, SpanLimits>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            default_tier: default_tier_name(),
            tiers: default_tiers(),
        }
    }
}

impl TierConfig {
    /// Look up the limits for a tier name, case-insensitively. An unknown
    /// or empty tier falls back to the default tier; a missing default
    /// tier falls back to [`FALLBACK_LIMITS`].
    pub fn limits_for(&self, tier: &str) -> SpanLimits {
        if !tier.is_empty() {
            if let Some(limits) = self.lookup(tier) {
                return limits;
            }
        }
        self.lookup(&self.default_tier).unwrap_or(FALLBACK_LIMITS)
    }

    fn lookup(&self, tier: &str) -> Option<SpanLimits> {
        self.tiers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tier))
            .map(|(_, limits)| *limits)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Seconds of inactivity before an empty client quota may be evicted.
    #[serde(default = "default_inactive_secs")]
    pub inactive_secs: u64,
    /// Period of the background eviction sweep.
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            inactive_secs: default_inactive_secs(),
            sweep_secs: default_sweep_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bound on the snapshot history, oldest evicted first.
    #[serde(default = "default_max_versions")]
    pub max_versions: usize,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_versions: default_max_versions(),
            watch: WatchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Rapid successive writes within this window collapse into a single
    /// validate-and-apply cycle.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_ms: default_poll_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Client identification directory: API keys and trusted networks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientsConfig {
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
    #[serde(default)]
    pub networks: Vec<NetworkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub tier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub cidr: String,
    pub name: String,
    #[serde(default)]
    pub tier: String,
}

// Default value helpers
fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_admin_listen() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_tier_name() -> String {
    "free".to_string()
}
fn default_tiers() -> HashMap<String, SpanLimits> {
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
            per_second: 10,
            per_minute: 300,
            per_hour: 5_000,
            per_day: 50_000,
        },
    );
    tiers
}
fn default_inactive_secs() -> u64 {
    600
}
fn default_sweep_secs() -> u64 {
    60
}
fn default_max_versions() -> usize {
    10
}
fn default_poll_ms() -> u64 {
    500
}
fn default_debounce_ms() -> u64 {
    750
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen.is_empty() {
            anyhow::bail!("server.listen must not be empty");
        }
        if self.policy_file.as_os_str().is_empty() {
            anyhow::bail!("policy_file must not be empty");
        }
        if self.tiers.tiers.is_empty() {
            anyhow::bail!("tiers must define at least one tier");
        }
        if self.tiers.lookup(&self.tiers.default_tier).is_none() {
            anyhow::bail!(
                "default tier '{}' is not defined in tiers",
                self.tiers.default_tier
            );
        }
        if self.limiter.sweep_secs == 0 {
            anyhow::bail!("limiter.sweep_secs must be greater than zero");
        }
        if self.store.max_versions == 0 {
            anyhow::bail!("store.max_versions must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
server:
  listen: "127.0.0.1:8080"
policy_file: policies.yaml
"#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.admin.listen, "127.0.0.1:9090");
        assert_eq!(config.tiers.default_tier, "free");
        assert_eq!(config.store.max_versions, 10);
        assert_eq!(config.store.watch.debounce_ms, 750);
    }

    #[test]
    fn tier_lookup_is_case_insensitive() {
        let tiers = TierConfig::default();
        assert_eq!(tiers.limits_for("FREE"), tiers.limits_for("free"));
        assert_eq!(tiers.limits_for("Premium").per_second, 10);
    }

    #[test]
    fn unknown_tier_falls_back_to_default() {
        let tiers = TierConfig::default();
        assert_eq!(tiers.limits_for("no-such-tier"), tiers.limits_for("free"));
        assert_eq!(tiers.limits_for(""), tiers.limits_for("free"));
    }

    #[test]
    fn missing_default_tier_uses_builtin_fallback() {
        let tiers = TierConfig {
            default_tier: "gone".to_string(),
            tiers: default_tiers(),
        };
        assert_eq!(tiers.limits_for("unknown"), FALLBACK_LIMITS);
    }

    #[test]
    fn rejects_default_tier_not_in_tiers() {
        let mut config: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        config.tiers.default_tier = "enterprise".to_string();
        assert!(config.validate().is_err());
    }
}
