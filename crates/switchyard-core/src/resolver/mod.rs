//! Model resolution
//!
//! Picks the most suitable catalog model for a task:
//!
//! - **Hard filters**: vendor allow-list, required capabilities and minimum
//!   context window. A model failing any of them is never returned.
//! - **Soft scoring**: cost, static quality, task preference bonus and a
//!   name based speed heuristic, weighted by the caller's cost/quality mix.
//! - **Budget**: a typical request projected over the caller's ceiling halves
//!   the score instead of excluding the model.
//! - **Cache**: ranked scores are cached per canonical request for five
//!   minutes.
//!
//! The resolver also answers cross-vendor equivalence lookups for the
//! failover engine.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use switchyard_core::catalog::StaticCatalog;
//! use switchyard_core::resolver::{ModelResolver, TaskRequest, TaskType};
//!
//! let resolver = ModelResolver::new(Arc::new(StaticCatalog::with_defaults()));
//! let request = TaskRequest::new(TaskType::Coding)
//!     .with_budget(0.05)
//!     .with_min_context_window(100_000);
//! let model = resolver.resolve(&request)?;
//! ```

mod model_resolver;
mod scoring;
mod types;

pub use model_resolver::{ModelResolver, ResolverSettings};
pub use scoring::{
    CapabilityTier, DEFAULT_MAX_RATE_CEILING, DEFAULT_QUALITY, MAX_PREFERENCE_BONUS,
    TYPICAL_INPUT_TOKENS, TYPICAL_OUTPUT_TOKENS, task_preferences,
};
pub use types::{ModelScore, TaskRequest, TaskType};
