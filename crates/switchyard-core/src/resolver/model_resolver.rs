//! Model Resolver - cost/quality aware model selection
//!
//! Hard constraints (vendor allow-list, capabilities, context window) exclude
//! models outright. Everything else feeds a weighted score, and the budget is
//! only a soft penalty.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::scoring::{self, CapabilityTier, DEFAULT_MAX_RATE_CEILING, typical_request_cost};
use super::types::{ModelScore, TaskRequest, TaskType};
use crate::catalog::{Model, ModelCatalog};
use crate::error::{Error, Result};

/// Runtime settings for the resolver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverSettings {
    /// How long a scored request stays cached
    pub cache_ttl: Duration,
    /// Combined per-million rate at which the cost score reaches zero
    pub max_rate_ceiling: f64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            max_rate_ceiling: DEFAULT_MAX_RATE_CEILING,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedScores {
    scores: Vec<ModelScore>,
    computed_at: Instant,
}

/// Scores catalog models against task requests
pub struct ModelResolver {
    catalog: Arc<dyn ModelCatalog>,
    settings: ResolverSettings,
    cache: RwLock<HashMap<String, CachedScores>>,
}

impl std::fmt::Debug for ModelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResolver")
            .field("settings", &self.settings)
            .field("cached_requests", &self.cache_len())
            .finish()
    }
}

impl ModelResolver {
    /// Create a resolver with default settings
    pub fn new(catalog: Arc<dyn ModelCatalog>) -> Self {
        Self::with_settings(catalog, ResolverSettings::default())
    }

    /// Create a resolver with custom settings
    pub fn with_settings(catalog: Arc<dyn ModelCatalog>, settings: ResolverSettings) -> Self {
        Self {
            catalog,
            settings,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The catalog this resolver reads from
    pub fn catalog(&self) -> &Arc<dyn ModelCatalog> {
        &self.catalog
    }

    /// Current settings
    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Pick the best model for a request
    pub fn resolve(&self, request: &TaskRequest) -> Result<Model> {
        let scores = self.score_models(request)?;
        // score_models never returns an empty list
        let best = &scores[0];

        info!(
            task = %request.task_type,
            model = %best.model.qualified_id(),
            score = best.score,
            reason = %best.reason,
            "Resolved model for task"
        );

        Ok(best.model.clone())
    }

    /// Pick the `n` best models for a request, best first
    pub fn resolve_top_n(&self, request: &TaskRequest, n: usize) -> Result<Vec<Model>> {
        let scores = self.score_models(request)?;
        Ok(scores.into_iter().take(n).map(|s| s.model).collect())
    }

    /// All eligible models for a request, ranked by combined score
    pub fn score_models(&self, request: &TaskRequest) -> Result<Vec<ModelScore>> {
        let key = request.cache_key();

        if request.use_cache {
            if let Some(scores) = self.cached(&key) {
                debug!(key = %key, "Score cache hit");
                return Ok(scores);
            }
        }

        let mut scores: Vec<ModelScore> = self
            .candidate_models(request)
            .into_iter()
            .filter(|m| passes_hard_filters(m, request))
            .map(|m| self.score(m, request))
            .collect();

        if scores.is_empty() {
            return Err(Error::NoModelFound(format!(
                "no {} model meets the capability, context window and vendor constraints",
                request.task_type
            )));
        }

        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.model.qualified_id().cmp(&b.model.qualified_id()))
        });

        debug!(
            task = %request.task_type,
            candidates = scores.len(),
            "Scored models"
        );

        if request.use_cache {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            cache.insert(
                key,
                CachedScores {
                    scores: scores.clone(),
                    computed_at: Instant::now(),
                },
            );
        }

        Ok(scores)
    }

    /// Catalog models named by the task's preference table, in preference order
    pub fn models_for_task(&self, task_type: TaskType) -> Vec<Model> {
        let vendors = self.catalog.list_vendors();
        scoring::task_preferences(task_type)
            .iter()
            .flat_map(|id| {
                vendors
                    .iter()
                    .filter_map(|vendor| self.catalog.get_model(vendor, id))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Find the closest counterpart of `model` offered by `vendor`
    ///
    /// Exact id first, then a model of the same capability tier, then the
    /// vendor's first model.
    pub fn find_equivalent(&self, model: &Model, vendor: &str) -> Result<Model> {
        let models = self.catalog.list_models(vendor);
        if models.is_empty() {
            return Err(Error::NoModelsForVendor(vendor.to_string()));
        }

        if let Some(exact) = models.iter().find(|m| m.id == model.id) {
            return Ok(exact.clone());
        }

        if let Some(tier) = CapabilityTier::classify(&model.id) {
            if let Some(same_tier) = models
                .iter()
                .find(|m| CapabilityTier::classify(&m.id) == Some(tier))
            {
                debug!(
                    from = %model.qualified_id(),
                    to = %same_tier.qualified_id(),
                    tier = %tier,
                    "Matched equivalent model by tier"
                );
                return Ok(same_tier.clone());
            }
        }

        Ok(models[0].clone())
    }

    /// Drop every cached score list
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached requests, including expired ones not yet evicted
    pub fn cache_len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn cached(&self, key: &str) -> Option<Vec<ModelScore>> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let fresh = cache
            .get(key)
            .map(|entry| entry.computed_at.elapsed() < self.settings.cache_ttl)?;

        if fresh {
            cache.get(key).map(|entry| entry.scores.clone())
        } else {
            cache.remove(key);
            None
        }
    }

    fn candidate_models(&self, request: &TaskRequest) -> Vec<Model> {
        self.catalog
            .list_vendors()
            .into_iter()
            .filter(|vendor| match &request.vendors {
                Some(allowed) => allowed.contains(vendor),
                None => true,
            })
            .flat_map(|vendor| self.catalog.list_models(&vendor))
            .collect()
    }

    fn score(&self, model: Model, request: &TaskRequest) -> ModelScore {
        let cost = scoring::cost_score(&model, self.settings.max_rate_ceiling);
        let quality = scoring::quality_score(&model.id);
        let (preference, rank) = scoring::preference_bonus(request.task_type, &model.id);
        let speed = scoring::speed_score(&model.id);

        let mut score = scoring::combine(
            cost,
            quality,
            preference,
            speed,
            request.cost_weight,
            request.quality_weight,
        );

        let over_budget = request
            .budget_usd
            .is_some_and(|budget| typical_request_cost(&model) > budget);
        if over_budget {
            score *= 0.5;
        }

        let mut reason = format!(
            "cost {:.2}, quality {:.2}, speed {:.2}",
            cost, quality, speed
        );
        if let Some(rank) = rank {
            reason.push_str(&format!(", preferred #{} for {}", rank + 1, request.task_type));
        }
        if over_budget {
            reason.push_str(", over budget (score halved)");
        }

        ModelScore {
            model,
            score,
            cost_score: cost,
            quality_score: quality,
            speed_score: speed,
            preference_bonus: preference,
            over_budget,
            reason,
        }
    }
}

fn passes_hard_filters(model: &Model, request: &TaskRequest) -> bool {
    if model.context_window < request.min_context_window {
        return false;
    }

    request
        .required_capabilities
        .iter()
        .all(|capability| model.supports(*capability))
}
