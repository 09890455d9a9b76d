//! Swarm configuration and composition output

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::Model;
use crate::cost::CostContext;
use crate::resolver::TaskType;

/// Vendors used when a swarm config names none
pub const DEFAULT_SWARM_VENDORS: [&str; 3] = ["anthropic", "openai", "google"];

/// How agent slots are spread over candidate vendors
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStrategy {
    /// Slot i goes to candidate vendor i mod n
    #[default]
    RoundRobin,
    /// Random draw proportional to weight; unlisted vendors weigh 1
    Weighted(HashMap<String, f64>),
    /// Every slot goes to the failover engine's best vendor
    PerformanceBased,
}

impl std::fmt::Display for DistributionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "round_robin"),
            Self::Weighted(_) => write!(f, "weighted"),
            Self::PerformanceBased => write!(f, "performance_based"),
        }
    }
}

impl std::str::FromStr for DistributionStrategy {
    type Err = String;

    /// Parses the weightless strategies and `weighted` with empty weights
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            "weighted" => Ok(Self::Weighted(HashMap::new())),
            "performance_based" | "performance" => Ok(Self::PerformanceBased),
            _ => Err(format!("Unknown distribution strategy: {}", s)),
        }
    }
}

/// Defaults applied to new swarm configs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSettings {
    pub vendors: Vec<String>,
    pub strategy: DistributionStrategy,
    pub budget_per_agent: Option<f64>,
    pub enable_failover: bool,
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            vendors: DEFAULT_SWARM_VENDORS.iter().map(ToString::to_string).collect(),
            strategy: DistributionStrategy::RoundRobin,
            budget_per_agent: None,
            enable_failover: true,
        }
    }
}

/// Request to compose a swarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    pub agent_count: usize,
    pub task_type: TaskType,
    /// Vendor allow-list, in priority order
    pub vendors: Vec<String>,
    pub strategy: DistributionStrategy,
    pub budget_per_agent: Option<f64>,
    pub enable_failover: bool,
}

impl SwarmConfig {
    /// Config with default vendors and round-robin distribution
    pub fn new(agent_count: usize, task_type: TaskType) -> Self {
        Self::with_settings(agent_count, task_type, &SwarmSettings::default())
    }

    /// Config seeded from configured defaults
    pub fn with_settings(agent_count: usize, task_type: TaskType, settings: &SwarmSettings) -> Self {
        Self {
            agent_count,
            task_type,
            vendors: settings.vendors.clone(),
            strategy: settings.strategy.clone(),
            budget_per_agent: settings.budget_per_agent,
            enable_failover: settings.enable_failover,
        }
    }

    pub fn with_vendors<I, S>(mut self, vendors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vendors = vendors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_strategy(mut self, strategy: DistributionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_budget_per_agent(mut self, budget_usd: f64) -> Self {
        self.budget_per_agent = Some(budget_usd);
        self
    }

    pub fn with_failover(mut self, enabled: bool) -> Self {
        self.enable_failover = enabled;
        self
    }
}

/// One agent's binding to a vendor and model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmAgentSlot {
    pub agent_id: String,
    pub model: Model,
    pub vendor: String,
    pub task_type: TaskType,
    pub budget_usd: Option<f64>,
    pub failover_enabled: bool,
}

/// A composed swarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swarm {
    pub swarm_id: String,
    pub task_type: TaskType,
    pub agent_slots: Vec<SwarmAgentSlot>,
    pub created_at: DateTime<Utc>,
}

impl Swarm {
    /// Slot count per vendor
    pub fn vendor_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for slot in &self.agent_slots {
            *counts.entry(slot.vendor.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Cost attribution for calls made by `slot`
    pub fn cost_context(&self, slot: &SwarmAgentSlot) -> CostContext {
        CostContext::new()
            .with_swarm(&self.swarm_id)
            .with_agent(&slot.agent_id)
    }
}

/// Uniform random numbers for weighted distribution
pub trait RandomSource: Send {
    /// Next value in [0, 1)
    fn next_f64(&mut self) -> f64;
}

/// [`RandomSource`] backed by `StdRng`
#[derive(Debug, Clone)]
pub struct StdRandomSource {
    rng: StdRng,
}

impl Default for StdRandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StdRandomSource {
    /// Seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixed seed, for reproducible distributions
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for StdRandomSource {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}
