//! Static partitioning of agents across vendors

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::Model;
use crate::error::{Error, Result};
use crate::failover::FailoverEngine;
use crate::resolver::ModelResolver;

use super::types::{
    DistributionStrategy, RandomSource, StdRandomSource, Swarm, SwarmAgentSlot, SwarmConfig,
};

/// Weight for vendors missing from a weighted strategy's table
const DEFAULT_VENDOR_WEIGHT: f64 = 1.0;

/// Assigns vendors and models to swarm agent slots
pub struct SwarmComposer {
    resolver: Arc<ModelResolver>,
    engine: Option<FailoverEngine>,
    random: Mutex<Box<dyn RandomSource>>,
}

impl std::fmt::Debug for SwarmComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmComposer")
            .field("engine", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}

impl SwarmComposer {
    /// Composer with an entropy-seeded random source and no failover engine
    pub fn new(resolver: Arc<ModelResolver>) -> Self {
        Self {
            resolver,
            engine: None,
            random: Mutex::new(Box::new(StdRandomSource::new())),
        }
    }

    /// Use the engine's health for performance-based distribution
    pub fn with_failover_engine(mut self, engine: FailoverEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replace the random source used for weighted draws
    pub fn with_random_source(mut self, source: impl RandomSource + 'static) -> Self {
        self.random = Mutex::new(Box::new(source));
        self
    }

    /// Build a swarm of `config.agent_count` slots
    pub fn compose_swarm(&self, config: &SwarmConfig) -> Result<Swarm> {
        let candidates = self.candidates(config);
        if candidates.is_empty() {
            return Err(Error::NoProvidersAvailable(format!(
                "no {} model among vendors [{}]",
                config.task_type,
                config.vendors.join(", ")
            )));
        }

        let swarm_id = Uuid::new_v4().to_string();
        let mut agent_slots = Vec::with_capacity(config.agent_count);

        for index in 0..config.agent_count {
            let (vendor, model) = &candidates[self.pick(config, &candidates, index)];
            agent_slots.push(SwarmAgentSlot {
                agent_id: format!("{}-agent-{}", swarm_id, index),
                model: model.clone(),
                vendor: vendor.clone(),
                task_type: config.task_type,
                budget_usd: config.budget_per_agent,
                failover_enabled: config.enable_failover,
            });
        }

        let swarm = Swarm {
            swarm_id,
            task_type: config.task_type,
            agent_slots,
            created_at: Utc::now(),
        };

        info!(
            swarm_id = %swarm.swarm_id,
            agents = swarm.agent_slots.len(),
            strategy = %config.strategy,
            distribution = ?swarm.vendor_distribution(),
            "Composed swarm"
        );

        Ok(swarm)
    }

    /// First task-matched model per allowed vendor, in allow-list order
    fn candidates(&self, config: &SwarmConfig) -> Vec<(String, Model)> {
        let task_models = self.resolver.models_for_task(config.task_type);
        let mut candidates: Vec<(String, Model)> = Vec::new();

        for vendor in &config.vendors {
            if candidates.iter().any(|(v, _)| v == vendor) {
                continue;
            }
            if let Some(model) = task_models.iter().find(|m| &m.vendor == vendor) {
                candidates.push((vendor.clone(), model.clone()));
            } else {
                debug!(vendor = %vendor, task_type = %config.task_type, "Vendor has no model for task");
            }
        }

        candidates
    }

    /// Candidate index for slot `index`
    fn pick(&self, config: &SwarmConfig, candidates: &[(String, Model)], index: usize) -> usize {
        match &config.strategy {
            DistributionStrategy::RoundRobin => index % candidates.len(),
            DistributionStrategy::Weighted(weights) => {
                let weights: Vec<f64> = candidates
                    .iter()
                    .map(|(vendor, _)| {
                        weights
                            .get(vendor)
                            .copied()
                            .unwrap_or(DEFAULT_VENDOR_WEIGHT)
                            .max(0.0)
                    })
                    .collect();
                let draw = self
                    .random
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .next_f64();
                weighted_index(&weights, draw).unwrap_or(index % candidates.len())
            }
            DistributionStrategy::PerformanceBased => {
                let vendors: Vec<String> = candidates.iter().map(|(v, _)| v.clone()).collect();
                self.engine
                    .as_ref()
                    .and_then(|engine| engine.best_vendor(&vendors))
                    .and_then(|best| vendors.iter().position(|v| *v == best))
                    .unwrap_or(0)
            }
        }
    }
}

/// Cumulative-weight selection for a draw in [0, 1); `None` when all weights are zero
fn weighted_index(weights: &[f64], draw: f64) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let target = draw * total;
    let mut cumulative = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if target < cumulative {
            return Some(i);
        }
    }

    // Rounding can leave target == total; give it to the last weighted vendor
    weights.iter().rposition(|w| *w > 0.0)
}
