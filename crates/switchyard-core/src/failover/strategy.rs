//! Failover strategies and engine configuration

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::health::VendorHealth;

/// How the candidate vendor order is built for each execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverStrategy {
    /// Primary first, then healthy backups in configured order
    #[default]
    Sequential,
    /// Rotate the starting vendor on every execution
    RoundRobin,
    /// Healthy vendors by success rate, then latency
    BestPerformance,
    /// Healthy vendors in configured order
    CostOptimized,
}

impl std::fmt::Display for FailoverStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::RoundRobin => write!(f, "round_robin"),
            Self::BestPerformance => write!(f, "best_performance"),
            Self::CostOptimized => write!(f, "cost_optimized"),
        }
    }
}

impl std::str::FromStr for FailoverStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sequential" => Ok(Self::Sequential),
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "best_performance" | "performance" => Ok(Self::BestPerformance),
            "cost_optimized" | "cost" => Ok(Self::CostOptimized),
            _ => Err(format!("Unknown failover strategy: {}", s)),
        }
    }
}

/// Failover engine settings
#[derive(Debug, Clone, PartialEq)]
pub struct FailoverConfig {
    pub strategy: FailoverStrategy,
    pub primary_vendor: String,
    pub backup_vendors: Vec<String>,
    /// Attempts per vendor before moving on (values below 1 act as 1)
    pub max_retries_per_vendor: u32,
    /// Base delay between retries on the same vendor, multiplied by the attempt index
    pub retry_delay: Duration,
    /// Deadline for one attempt
    pub attempt_timeout: Duration,
    /// Minimum success rate for a vendor to count as healthy
    pub health_threshold: f64,
    /// Smoothing factor for the latency moving average
    pub latency_alpha: f64,
    /// How long attempts stay in the history
    pub history_window: Duration,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            strategy: FailoverStrategy::Sequential,
            primary_vendor: "anthropic".to_string(),
            backup_vendors: vec!["openai".to_string(), "google".to_string()],
            max_retries_per_vendor: 2,
            retry_delay: Duration::from_millis(1_000),
            attempt_timeout: Duration::from_secs(60),
            health_threshold: 0.5,
            latency_alpha: 0.1,
            history_window: Duration::from_secs(3_600),
        }
    }
}

impl FailoverConfig {
    /// Create a config with a primary and ordered backups
    pub fn new<I, S>(primary_vendor: impl Into<String>, backup_vendors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            primary_vendor: primary_vendor.into(),
            backup_vendors: backup_vendors.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: FailoverStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries_per_vendor = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_health_threshold(mut self, threshold: f64) -> Self {
        self.health_threshold = threshold;
        self
    }

    pub fn with_history_window(mut self, window: Duration) -> Self {
        self.history_window = window;
        self
    }

    /// Primary followed by backups, duplicates removed
    pub fn vendors(&self) -> Vec<String> {
        let mut vendors = vec![self.primary_vendor.clone()];
        for backup in &self.backup_vendors {
            if !vendors.contains(backup) {
                vendors.push(backup.clone());
            }
        }
        vendors
    }

    /// Attempts per vendor, at least one
    pub fn effective_retries(&self) -> u32 {
        self.max_retries_per_vendor.max(1)
    }
}

/// Candidate vendor order for one execution
///
/// `vendors` is primary-then-backups; `rotation` only matters for round robin.
/// When filtering leaves nothing, the unfiltered order is returned so callers
/// always have someone to try.
pub fn order_vendors(
    strategy: FailoverStrategy,
    vendors: &[String],
    health: &HashMap<String, VendorHealth>,
    rotation: usize,
) -> Vec<String> {
    let is_healthy = |v: &str| health.get(v).is_none_or(|h| h.healthy);

    let (filtered, unfiltered): (Vec<String>, Vec<String>) = match strategy {
        FailoverStrategy::Sequential => {
            let Some((primary, backups)) = vendors.split_first() else {
                return Vec::new();
            };
            let mut order = vec![primary.clone()];
            order.extend(backups.iter().filter(|v| is_healthy(v.as_str())).cloned());
            (order, vendors.to_vec())
        }
        FailoverStrategy::RoundRobin => {
            let mut rotated = vendors.to_vec();
            if !rotated.is_empty() {
                let offset = rotation % rotated.len();
                rotated.rotate_left(offset);
            }
            let filtered = rotated.iter().filter(|v| is_healthy(v.as_str())).cloned().collect();
            (filtered, rotated)
        }
        FailoverStrategy::BestPerformance => {
            let mut ranked: Vec<&VendorHealth> = vendors
                .iter()
                .filter_map(|v| health.get(v))
                .filter(|h| h.healthy)
                .collect();
            ranked.sort_by(|a, b| compare_performance(a, b));
            let filtered = ranked.into_iter().map(|h| h.vendor.clone()).collect();
            (filtered, vendors.to_vec())
        }
        FailoverStrategy::CostOptimized => {
            let filtered = vendors.iter().filter(|v| is_healthy(v.as_str())).cloned().collect();
            (filtered, vendors.to_vec())
        }
    };

    if filtered.is_empty() {
        unfiltered
    } else {
        filtered
    }
}

/// Success rate descending, then average latency ascending
pub fn compare_performance(a: &VendorHealth, b: &VendorHealth) -> Ordering {
    b.success_rate
        .partial_cmp(&a.success_rate)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.avg_latency_ms
                .partial_cmp(&b.avg_latency_ms)
                .unwrap_or(Ordering::Equal)
        })
}
