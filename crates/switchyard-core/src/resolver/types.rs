//! Types for cost/quality aware model resolution

use serde::{Deserialize, Serialize};

use crate::catalog::{Capability, Model};

/// Kind of work a request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Code generation, refactoring, review
    #[default]
    Coding,
    /// Multi-step reasoning, planning, math
    Reasoning,
    /// Conversational turns
    Chat,
    /// Reading and interpreting large inputs
    Analysis,
    /// Open-ended writing
    Creative,
    /// Condensing content
    Summarization,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coding => write!(f, "coding"),
            Self::Reasoning => write!(f, "reasoning"),
            Self::Chat => write!(f, "chat"),
            Self::Analysis => write!(f, "analysis"),
            Self::Creative => write!(f, "creative"),
            Self::Summarization => write!(f, "summarization"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coding" | "code" => Ok(Self::Coding),
            "reasoning" => Ok(Self::Reasoning),
            "chat" => Ok(Self::Chat),
            "analysis" => Ok(Self::Analysis),
            "creative" => Ok(Self::Creative),
            "summarization" | "summary" => Ok(Self::Summarization),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// Constraints and preferences for picking a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_type: TaskType,
    /// Soft ceiling in USD for a typical (4K in / 1K out) request
    pub budget_usd: Option<f64>,
    /// Vendor allow-list; all catalog vendors when absent
    pub vendors: Option<Vec<String>>,
    /// Capabilities a model must have
    pub required_capabilities: Vec<Capability>,
    /// Weight of the cost sub-score
    pub cost_weight: f64,
    /// Weight of the quality sub-score
    pub quality_weight: f64,
    /// Minimum context window a model must offer
    pub min_context_window: u64,
    /// Read and populate the score cache
    pub use_cache: bool,
}

impl TaskRequest {
    /// Create a request with balanced weights and no constraints
    pub fn new(task_type: TaskType) -> Self {
        Self {
            task_type,
            budget_usd: None,
            vendors: None,
            required_capabilities: Vec::new(),
            cost_weight: 0.5,
            quality_weight: 0.5,
            min_context_window: 0,
            use_cache: true,
        }
    }

    /// Set the soft budget ceiling
    pub fn with_budget(mut self, budget_usd: f64) -> Self {
        self.budget_usd = Some(budget_usd);
        self
    }

    /// Restrict to a set of vendors
    pub fn with_vendors<I, S>(mut self, vendors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vendors = Some(vendors.into_iter().map(Into::into).collect());
        self
    }

    /// Require a capability
    pub fn requiring(mut self, capability: Capability) -> Self {
        if !self.required_capabilities.contains(&capability) {
            self.required_capabilities.push(capability);
        }
        self
    }

    /// Set cost and quality weights (each clamped to [0, 1])
    pub fn with_weights(mut self, cost_weight: f64, quality_weight: f64) -> Self {
        self.cost_weight = cost_weight.clamp(0.0, 1.0);
        self.quality_weight = quality_weight.clamp(0.0, 1.0);
        self
    }

    /// Set the minimum context window
    pub fn with_min_context_window(mut self, tokens: u64) -> Self {
        self.min_context_window = tokens;
        self
    }

    /// Enable or bypass the score cache
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Canonical key for the score cache
    ///
    /// Vendor and capability order do not matter; `use_cache` is excluded.
    pub fn cache_key(&self) -> String {
        let mut vendors = self.vendors.clone();
        if let Some(v) = vendors.as_mut() {
            v.sort();
            v.dedup();
        }

        let mut capabilities = self.required_capabilities.clone();
        capabilities.sort();
        capabilities.dedup();

        let capabilities: Vec<String> = capabilities.iter().map(ToString::to_string).collect();

        format!(
            "{}|budget={}|vendors={}|caps={}|w={}/{}|ctx={}",
            self.task_type,
            self.budget_usd
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            vendors
                .map(|v| v.join(","))
                .unwrap_or_else(|| "*".to_string()),
            capabilities.join(","),
            self.cost_weight,
            self.quality_weight,
            self.min_context_window,
        )
    }
}

/// Scored candidate for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: Model,
    /// Combined score in [0, 1]
    pub score: f64,
    pub cost_score: f64,
    pub quality_score: f64,
    pub speed_score: f64,
    /// Bonus from the task preference table, up to 0.3
    pub preference_bonus: f64,
    /// Whether the soft budget halved the score
    pub over_budget: bool,
    /// Human-readable explanation
    pub reason: String,
}
