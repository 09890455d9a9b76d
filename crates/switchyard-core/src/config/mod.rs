//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cost::CostSettings;
use crate::failover::{FailoverConfig, FailoverStrategy};
use crate::resolver::{DEFAULT_MAX_RATE_CEILING, ResolverSettings};
use crate::swarm::{DEFAULT_SWARM_VENDORS, DistributionStrategy, SwarmSettings};

/// Switchyard configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverSection,
    pub failover: FailoverSection,
    pub cost: CostSection,
    pub swarm: SwarmSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    pub cache_ttl_secs: u64,
    pub max_rate_ceiling: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailoverSection {
    pub strategy: FailoverStrategy,
    pub primary_vendor: String,
    pub backup_vendors: Vec<String>,
    pub max_retries_per_vendor: u32,
    pub retry_delay_ms: u64,
    pub attempt_timeout_ms: u64,
    pub health_threshold: f64,
    pub latency_alpha: f64,
    pub history_window_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSection {
    pub budget_limit_usd: f64,
    pub warning_threshold: f64,
    pub stop_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmSection {
    pub vendors: Vec<String>,
    /// round_robin, weighted or performance_based
    pub strategy: String,
    /// Per-vendor weights for the weighted strategy
    pub weights: BTreeMap<String, f64>,
    pub budget_per_agent: Option<f64>,
    pub enable_failover: bool,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            max_rate_ceiling: DEFAULT_MAX_RATE_CEILING,
        }
    }
}

impl Default for FailoverSection {
    fn default() -> Self {
        let defaults = FailoverConfig::default();
        Self {
            strategy: defaults.strategy,
            primary_vendor: defaults.primary_vendor,
            backup_vendors: defaults.backup_vendors,
            max_retries_per_vendor: defaults.max_retries_per_vendor,
            retry_delay_ms: defaults.retry_delay.as_millis() as u64,
            attempt_timeout_ms: defaults.attempt_timeout.as_millis() as u64,
            health_threshold: defaults.health_threshold,
            latency_alpha: defaults.latency_alpha,
            history_window_secs: defaults.history_window.as_secs(),
        }
    }
}

impl Default for CostSection {
    fn default() -> Self {
        let defaults = CostSettings::default();
        Self {
            budget_limit_usd: defaults.budget_limit_usd,
            warning_threshold: defaults.warning_threshold,
            stop_threshold: defaults.stop_threshold,
        }
    }
}

impl Default for SwarmSection {
    fn default() -> Self {
        Self {
            vendors: DEFAULT_SWARM_VENDORS.iter().map(ToString::to_string).collect(),
            strategy: "round_robin".to_string(),
            weights: BTreeMap::new(),
            budget_per_agent: None,
            enable_failover: true,
        }
    }
}

impl ResolverSection {
    pub fn settings(&self) -> ResolverSettings {
        ResolverSettings {
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            max_rate_ceiling: self.max_rate_ceiling,
        }
    }
}

impl FailoverSection {
    pub fn settings(&self) -> FailoverConfig {
        FailoverConfig {
            strategy: self.strategy,
            primary_vendor: self.primary_vendor.clone(),
            backup_vendors: self.backup_vendors.clone(),
            max_retries_per_vendor: self.max_retries_per_vendor,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            health_threshold: self.health_threshold,
            latency_alpha: self.latency_alpha,
            history_window: Duration::from_secs(self.history_window_secs),
        }
    }
}

impl CostSection {
    pub fn settings(&self) -> CostSettings {
        CostSettings {
            budget_limit_usd: self.budget_limit_usd,
            warning_threshold: self.warning_threshold,
            stop_threshold: self.stop_threshold,
        }
    }
}

impl SwarmSection {
    pub fn settings(&self) -> anyhow::Result<SwarmSettings> {
        let strategy = match self
            .strategy
            .parse::<DistributionStrategy>()
            .map_err(|e| anyhow!(e))?
        {
            DistributionStrategy::Weighted(_) => DistributionStrategy::Weighted(
                self.weights.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            ),
            other => other,
        };

        Ok(SwarmSettings {
            vendors: self.vendors.clone(),
            strategy,
            budget_per_agent: self.budget_per_agent,
            enable_failover: self.enable_failover,
        })
    }
}

const KEYS: &[&str] = &[
    "resolver.cache_ttl_secs",
    "resolver.max_rate_ceiling",
    "failover.strategy",
    "failover.primary_vendor",
    "failover.backup_vendors",
    "failover.max_retries_per_vendor",
    "failover.retry_delay_ms",
    "failover.attempt_timeout_ms",
    "failover.health_threshold",
    "failover.latency_alpha",
    "failover.history_window_secs",
    "cost.budget_limit_usd",
    "cost.warning_threshold",
    "cost.stop_threshold",
    "swarm.vendors",
    "swarm.strategy",
    "swarm.weights",
    "swarm.budget_per_agent",
    "swarm.enable_failover",
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("SWITCHYARD_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("switchyard")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.resolver.max_rate_ceiling <= 0.0 {
            return Err(anyhow!("resolver.max_rate_ceiling must be positive"));
        }

        let failover = &self.failover;
        if failover.primary_vendor.trim().is_empty() {
            return Err(anyhow!("failover.primary_vendor must not be empty"));
        }
        if failover.max_retries_per_vendor == 0 {
            return Err(anyhow!("failover.max_retries_per_vendor must be at least 1"));
        }
        if failover.attempt_timeout_ms == 0 {
            return Err(anyhow!("failover.attempt_timeout_ms must be positive"));
        }
        if !(0.0..=1.0).contains(&failover.health_threshold) {
            return Err(anyhow!("failover.health_threshold must be between 0.0 and 1.0"));
        }
        if !(failover.latency_alpha > 0.0 && failover.latency_alpha <= 1.0) {
            return Err(anyhow!("failover.latency_alpha must be in (0.0, 1.0]"));
        }

        let cost = &self.cost;
        if cost.budget_limit_usd < 0.0 {
            return Err(anyhow!("cost.budget_limit_usd must be non-negative"));
        }
        for (name, value) in [
            ("cost.warning_threshold", cost.warning_threshold),
            ("cost.stop_threshold", cost.stop_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be between 0.0 and 1.0", name));
            }
        }
        if cost.warning_threshold > cost.stop_threshold {
            return Err(anyhow!(
                "cost.warning_threshold must not exceed cost.stop_threshold"
            ));
        }

        if self.swarm.vendors.is_empty() {
            return Err(anyhow!("swarm.vendors must name at least one vendor"));
        }
        if self.swarm.weights.values().any(|w| *w < 0.0) {
            return Err(anyhow!("swarm.weights must be non-negative"));
        }
        self.swarm.settings()?;

        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "resolver.cache_ttl_secs" => Ok(self.resolver.cache_ttl_secs.to_string()),
            "resolver.max_rate_ceiling" => Ok(self.resolver.max_rate_ceiling.to_string()),

            "failover.strategy" => Ok(self.failover.strategy.to_string()),
            "failover.primary_vendor" => Ok(self.failover.primary_vendor.clone()),
            "failover.backup_vendors" => Ok(self.failover.backup_vendors.join(", ")),
            "failover.max_retries_per_vendor" => {
                Ok(self.failover.max_retries_per_vendor.to_string())
            }
            "failover.retry_delay_ms" => Ok(self.failover.retry_delay_ms.to_string()),
            "failover.attempt_timeout_ms" => Ok(self.failover.attempt_timeout_ms.to_string()),
            "failover.health_threshold" => Ok(self.failover.health_threshold.to_string()),
            "failover.latency_alpha" => Ok(self.failover.latency_alpha.to_string()),
            "failover.history_window_secs" => Ok(self.failover.history_window_secs.to_string()),

            "cost.budget_limit_usd" => Ok(self.cost.budget_limit_usd.to_string()),
            "cost.warning_threshold" => Ok(self.cost.warning_threshold.to_string()),
            "cost.stop_threshold" => Ok(self.cost.stop_threshold.to_string()),

            "swarm.vendors" => Ok(self.swarm.vendors.join(", ")),
            "swarm.strategy" => Ok(self.swarm.strategy.clone()),
            "swarm.weights" => Ok(self
                .swarm
                .weights
                .iter()
                .map(|(vendor, weight)| format!("{}={}", vendor, weight))
                .collect::<Vec<_>>()
                .join(", ")),
            "swarm.budget_per_agent" => Ok(self
                .swarm
                .budget_per_agent
                .map(|b| b.to_string())
                .unwrap_or_else(|| "(none)".to_string())),
            "swarm.enable_failover" => Ok(self.swarm.enable_failover.to_string()),

            _ => Err(anyhow!("Unknown configuration key: {}", key)),
        }
    }

    /// Set a configuration value by key
    ///
    /// The whole config is validated after the change; on failure it is left untouched.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut next = self.clone();
        next.apply(key, value)?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "resolver.cache_ttl_secs" => self.resolver.cache_ttl_secs = parse(key, value)?,
            "resolver.max_rate_ceiling" => self.resolver.max_rate_ceiling = parse(key, value)?,

            "failover.strategy" => {
                self.failover.strategy = value.parse().map_err(|e: String| anyhow!(e))?;
            }
            "failover.primary_vendor" => self.failover.primary_vendor = value.trim().to_string(),
            "failover.backup_vendors" => self.failover.backup_vendors = parse_list(value),
            "failover.max_retries_per_vendor" => {
                self.failover.max_retries_per_vendor = parse(key, value)?;
            }
            "failover.retry_delay_ms" => self.failover.retry_delay_ms = parse(key, value)?,
            "failover.attempt_timeout_ms" => self.failover.attempt_timeout_ms = parse(key, value)?,
            "failover.health_threshold" => self.failover.health_threshold = parse(key, value)?,
            "failover.latency_alpha" => self.failover.latency_alpha = parse(key, value)?,
            "failover.history_window_secs" => {
                self.failover.history_window_secs = parse(key, value)?;
            }

            "cost.budget_limit_usd" => self.cost.budget_limit_usd = parse(key, value)?,
            "cost.warning_threshold" => self.cost.warning_threshold = parse(key, value)?,
            "cost.stop_threshold" => self.cost.stop_threshold = parse(key, value)?,

            "swarm.vendors" => self.swarm.vendors = parse_list(value),
            "swarm.strategy" => {
                value
                    .parse::<DistributionStrategy>()
                    .map_err(|e| anyhow!(e))?;
                self.swarm.strategy = value.to_string();
            }
            "swarm.weights" => {
                let mut weights = BTreeMap::new();
                for pair in parse_list(value) {
                    let (vendor, weight) = pair
                        .split_once('=')
                        .ok_or_else(|| anyhow!("Invalid weight entry '{}', expected vendor=weight", pair))?;
                    weights.insert(vendor.trim().to_string(), parse(key, weight.trim())?);
                }
                self.swarm.weights = weights;
            }
            "swarm.budget_per_agent" => {
                self.swarm.budget_per_agent = match value.trim() {
                    "" | "none" => None,
                    v => Some(parse(key, v)?),
                };
            }
            "swarm.enable_failover" => self.swarm.enable_failover = parse(key, value)?,

            _ => return Err(anyhow!("Unknown configuration key: {}", key)),
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults by removing the config file
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_component_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.failover.settings(), FailoverConfig::default());
        assert_eq!(config.cost.settings(), CostSettings::default());
        assert_eq!(config.resolver.settings(), ResolverSettings::default());
        assert_eq!(config.swarm.settings().unwrap(), SwarmSettings::default());
    }

    #[test]
    fn test_get_set_roundtrip() {
        let mut config = Config::default();
        config.set("failover.strategy", "round-robin").unwrap();
        config.set("failover.backup_vendors", "google, openai").unwrap();
        config.set("cost.budget_limit_usd", "25").unwrap();
        config.set("swarm.budget_per_agent", "0.5").unwrap();

        assert_eq!(config.get("failover.strategy").unwrap(), "round_robin");
        assert_eq!(config.failover.backup_vendors, vec!["google", "openai"]);
        assert_eq!(config.get("cost.budget_limit_usd").unwrap(), "25");
        assert_eq!(config.swarm.budget_per_agent, Some(0.5));
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("cost.warning_threshold", "1.5").is_err());
        assert!(config.set("cost.warning_threshold", "0.99").is_err());
        assert!(config.set("failover.max_retries_per_vendor", "0").is_err());
        assert!(config.set("failover.strategy", "random").is_err());
        assert!(config.set("swarm.strategy", "chaotic").is_err());
        assert!(config.set("nope.key", "1").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_weighted_swarm_settings() {
        let mut config = Config::default();
        config.set("swarm.strategy", "weighted").unwrap();
        config.set("swarm.weights", "anthropic=3, openai=1").unwrap();

        match config.swarm.settings().unwrap().strategy {
            DistributionStrategy::Weighted(weights) => {
                assert_eq!(weights.get("anthropic"), Some(&3.0));
                assert_eq!(weights.len(), 2);
            }
            other => panic!("unexpected strategy {other}"),
        }
        assert!(config.set("swarm.weights", "anthropic").is_err());
    }

    #[test]
    fn test_list_covers_every_key() {
        let listed = Config::default().list().unwrap();
        assert_eq!(listed.len(), KEYS.len());
        assert!(listed.iter().any(|(k, v)| k == "failover.primary_vendor" && v == "anthropic"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let mut config = Config::default();
        config.set("failover.primary_vendor", "openai").unwrap();
        config.set("resolver.cache_ttl_secs", "60").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cost]\nbudget_limit_usd = 3.0\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.cost.budget_limit_usd, 3.0);
        assert_eq!(loaded.cost.warning_threshold, 0.75);
        assert_eq!(loaded.failover, FailoverSection::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[failover]\nhealth_threshold = 4.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
