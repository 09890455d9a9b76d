//! Model catalog boundary
//!
//! The catalog enumerates the models each vendor offers together with their
//! price and capability metadata. It is owned by the caller; the core only
//! reads from it through [`ModelCatalog`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A capability a task may require from a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Accepts text input
    Text,
    /// Accepts image input
    Vision,
    /// Supports extended reasoning
    Reasoning,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Vision => write!(f, "vision"),
            Self::Reasoning => write!(f, "reasoning"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "vision" | "image" => Ok(Self::Vision),
            "reasoning" => Ok(Self::Reasoning),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

/// Vendor-supplied model descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier within its vendor (e.g., "claude-sonnet-4-20250514")
    pub id: String,
    /// Vendor offering the model (e.g., "anthropic")
    pub vendor: String,
    /// Cost per million input tokens in USD
    pub input_cost_per_million: f64,
    /// Cost per million output tokens in USD
    pub output_cost_per_million: f64,
    /// Cost per million cache-read tokens in USD
    pub cache_read_cost_per_million: f64,
    /// Cost per million cache-write tokens in USD
    pub cache_write_cost_per_million: f64,
    /// Maximum context window size
    pub context_window: u64,
    /// Maximum output tokens per request
    pub max_output_tokens: u64,
    /// Accepts text input
    pub text_input: bool,
    /// Accepts image input
    pub image_input: bool,
    /// Supports extended reasoning
    pub reasoning: bool,
}

impl Model {
    /// Create a new text-only model with placeholder pricing
    pub fn new(vendor: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor: vendor.into(),
            input_cost_per_million: 1.0,
            output_cost_per_million: 5.0,
            cache_read_cost_per_million: 0.0,
            cache_write_cost_per_million: 0.0,
            context_window: 128_000,
            max_output_tokens: 8_192,
            text_input: true,
            image_input: false,
            reasoning: false,
        }
    }

    /// Set input/output pricing
    pub fn with_pricing(mut self, input: f64, output: f64) -> Self {
        self.input_cost_per_million = input;
        self.output_cost_per_million = output;
        self
    }

    /// Set cache read/write pricing
    pub fn with_cache_pricing(mut self, read: f64, write: f64) -> Self {
        self.cache_read_cost_per_million = read;
        self.cache_write_cost_per_million = write;
        self
    }

    /// Set context window
    pub fn with_context_window(mut self, size: u64) -> Self {
        self.context_window = size;
        self
    }

    /// Set maximum output tokens
    pub fn with_max_output_tokens(mut self, tokens: u64) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Enable image input
    pub fn with_vision(mut self, enabled: bool) -> Self {
        self.image_input = enabled;
        self
    }

    /// Enable reasoning
    pub fn with_reasoning(mut self, enabled: bool) -> Self {
        self.reasoning = enabled;
        self
    }

    /// Whether the model offers a capability
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Text => self.text_input,
            Capability::Vision => self.image_input,
            Capability::Reasoning => self.reasoning,
        }
    }

    /// Fully qualified name, `vendor/id`
    pub fn qualified_id(&self) -> String {
        format!("{}/{}", self.vendor, self.id)
    }

    /// Estimate cost in USD for a given token count
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input_cost + output_cost
    }
}

/// Read-only source of vendor model descriptors
pub trait ModelCatalog: Send + Sync {
    /// All vendors known to the catalog, in catalog order
    fn list_vendors(&self) -> Vec<String>;

    /// Models offered by a vendor, in catalog order (empty if unknown)
    fn list_models(&self, vendor: &str) -> Vec<Model>;

    /// Look up a single model
    fn get_model(&self, vendor: &str, id: &str) -> Option<Model> {
        self.list_models(vendor).into_iter().find(|m| m.id == id)
    }
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    vendors: Vec<String>,
    models: HashMap<String, Vec<Model>>,
}

impl StaticCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with a representative lineup for the default vendors
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();

        catalog.register(
            Model::new("anthropic", "claude-opus-4-20250514")
                .with_pricing(15.0, 75.0)
                .with_cache_pricing(1.5, 18.75)
                .with_context_window(200_000)
                .with_max_output_tokens(32_000)
                .with_vision(true)
                .with_reasoning(true),
        );
        catalog.register(
            Model::new("anthropic", "claude-sonnet-4-20250514")
                .with_pricing(3.0, 15.0)
                .with_cache_pricing(0.3, 3.75)
                .with_context_window(200_000)
                .with_max_output_tokens(64_000)
                .with_vision(true)
                .with_reasoning(true),
        );
        catalog.register(
            Model::new("anthropic", "claude-3-5-haiku-latest")
                .with_pricing(0.80, 4.0)
                .with_cache_pricing(0.08, 1.0)
                .with_context_window(200_000)
                .with_max_output_tokens(8_192)
                .with_vision(true),
        );

        catalog.register(
            Model::new("openai", "o1")
                .with_pricing(15.0, 60.0)
                .with_cache_pricing(7.5, 0.0)
                .with_context_window(200_000)
                .with_max_output_tokens(100_000)
                .with_vision(true)
                .with_reasoning(true),
        );
        catalog.register(
            Model::new("openai", "gpt-4o")
                .with_pricing(2.50, 10.0)
                .with_cache_pricing(1.25, 0.0)
                .with_context_window(128_000)
                .with_max_output_tokens(16_384)
                .with_vision(true),
        );
        catalog.register(
            Model::new("openai", "gpt-4o-mini")
                .with_pricing(0.15, 0.60)
                .with_cache_pricing(0.075, 0.0)
                .with_context_window(128_000)
                .with_max_output_tokens(16_384)
                .with_vision(true),
        );

        catalog.register(
            Model::new("google", "gemini-2.5-pro")
                .with_pricing(1.25, 10.0)
                .with_cache_pricing(0.31, 0.0)
                .with_context_window(1_000_000)
                .with_max_output_tokens(65_536)
                .with_vision(true)
                .with_reasoning(true),
        );
        catalog.register(
            Model::new("google", "gemini-2.0-flash")
                .with_pricing(0.10, 0.40)
                .with_cache_pricing(0.025, 0.0)
                .with_context_window(1_000_000)
                .with_max_output_tokens(8_192)
                .with_vision(true),
        );

        catalog
    }

    /// Register a model, appending its vendor if new
    pub fn register(&mut self, model: Model) {
        if !self.vendors.contains(&model.vendor) {
            self.vendors.push(model.vendor.clone());
        }
        let models = self.models.entry(model.vendor.clone()).or_default();
        models.retain(|m| m.id != model.id);
        models.push(model);
    }

    /// Register a vendor with no models yet
    pub fn register_vendor(&mut self, vendor: impl Into<String>) {
        let vendor = vendor.into();
        if !self.vendors.contains(&vendor) {
            self.vendors.push(vendor.clone());
            self.models.entry(vendor).or_default();
        }
    }

    /// Total number of models across vendors
    pub fn len(&self) -> usize {
        self.models.values().map(Vec::len).sum()
    }

    /// Whether the catalog has no models
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelCatalog for StaticCatalog {
    fn list_vendors(&self) -> Vec<String> {
        self.vendors.clone()
    }

    fn list_models(&self, vendor: &str) -> Vec<Model> {
        self.models.get(vendor).cloned().unwrap_or_default()
    }
}
