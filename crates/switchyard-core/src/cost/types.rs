//! Cost records, budget state and report views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Model;

/// Token usage for a single model call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input/prompt tokens
    pub input_tokens: u64,
    /// Number of output/completion tokens
    pub output_tokens: u64,
    /// Number of tokens served from the prompt cache
    #[serde(default)]
    pub cache_read_tokens: u64,
    /// Number of tokens written to the prompt cache
    #[serde(default)]
    pub cache_write_tokens: u64,
}

impl TokenUsage {
    /// Create a new token usage record
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
        }
    }

    /// Set cache token counts
    pub fn with_cache(mut self, read: u64, write: u64) -> Self {
        self.cache_read_tokens = read;
        self.cache_write_tokens = write;
        self
    }

    /// Total tokens across all categories
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_write_tokens
    }
}

/// Cost of one call split by usage category, in USD
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub cache_read_cost_usd: f64,
    pub cache_write_cost_usd: f64,
    pub total_cost_usd: f64,
}

impl CostBreakdown {
    /// Price a usage record against a model's per-million rates
    pub fn calculate(model: &Model, usage: &TokenUsage) -> Self {
        let input = model.input_cost_per_million / 1_000_000.0 * usage.input_tokens as f64;
        let output = model.output_cost_per_million / 1_000_000.0 * usage.output_tokens as f64;
        let cache_read =
            model.cache_read_cost_per_million / 1_000_000.0 * usage.cache_read_tokens as f64;
        let cache_write =
            model.cache_write_cost_per_million / 1_000_000.0 * usage.cache_write_tokens as f64;

        Self {
            input_cost_usd: input,
            output_cost_usd: output,
            cache_read_cost_usd: cache_read,
            cache_write_cost_usd: cache_write,
            total_cost_usd: input + output + cache_read + cache_write,
        }
    }
}

/// Correlation data attached to a recorded cost
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostContext {
    pub task_id: Option<String>,
    pub agent_id: Option<String>,
    pub swarm_id: Option<String>,
    /// Call latency in milliseconds
    pub latency_ms: Option<u64>,
    pub metadata: BTreeMap<String, String>,
}

impl CostContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task id
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Set the agent id
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Set the swarm id
    pub fn with_swarm(mut self, swarm_id: impl Into<String>) -> Self {
        self.swarm_id = Some(swarm_id.into());
        self
    }

    /// Set latency
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One billed usage record; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    /// Unique identifier for this cost record
    pub id: String,
    /// Timestamp of the call
    pub timestamp: DateTime<Utc>,
    pub vendor: String,
    pub model_id: String,
    pub usage: TokenUsage,
    pub cost: CostBreakdown,
    pub task_id: Option<String>,
    pub agent_id: Option<String>,
    pub swarm_id: Option<String>,
    pub latency_ms: Option<u64>,
    pub metadata: BTreeMap<String, String>,
}

impl CostEntry {
    /// Total cost in USD
    pub fn total_cost_usd(&self) -> f64 {
        self.cost.total_cost_usd
    }
}

/// Snapshot of spend against the budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetState {
    pub total_cost_usd: f64,
    pub budget_limit_usd: f64,
    /// Fraction of the budget spent (0.6 means 60%)
    pub percent_used: f64,
    pub remaining_usd: f64,
    pub entry_count: usize,
    pub warning_triggered: bool,
    pub stop_triggered: bool,
}

/// Result of a what-if budget check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetProjection {
    /// The projected total would be over the budget
    pub exceeds: bool,
    pub projected_total_usd: f64,
    /// Budget left after the projected spend (never negative)
    pub remaining_usd: f64,
}

/// Aggregated cost for one vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorCostSummary {
    pub vendor: String,
    pub total_cost_usd: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub call_count: u32,
}

impl VendorCostSummary {
    /// Create a new empty vendor summary
    pub fn new(vendor: String) -> Self {
        Self {
            vendor,
            total_cost_usd: 0.0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            call_count: 0,
        }
    }

    /// Add a cost record to this summary
    pub fn add(&mut self, entry: &CostEntry) {
        self.total_cost_usd += entry.total_cost_usd();
        self.total_input_tokens += entry.usage.input_tokens;
        self.total_output_tokens += entry.usage.output_tokens;
        self.call_count += 1;
    }
}

/// Aggregated cost for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCostSummary {
    pub vendor: String,
    pub model_id: String,
    pub total_cost_usd: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub call_count: u32,
}

impl ModelCostSummary {
    /// Create a new empty model summary
    pub fn new(vendor: String, model_id: String) -> Self {
        Self {
            vendor,
            model_id,
            total_cost_usd: 0.0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            call_count: 0,
        }
    }

    /// Add a cost record to this summary
    pub fn add(&mut self, entry: &CostEntry) {
        self.total_cost_usd += entry.total_cost_usd();
        self.total_input_tokens += entry.usage.input_tokens;
        self.total_output_tokens += entry.usage.output_tokens;
        self.call_count += 1;
    }
}

/// Full export of the tracker's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub generated_at: DateTime<Utc>,
    pub status: BudgetState,
    pub by_provider: Vec<VendorCostSummary>,
    pub by_model: Vec<ModelCostSummary>,
    pub entries: Vec<CostEntry>,
}
