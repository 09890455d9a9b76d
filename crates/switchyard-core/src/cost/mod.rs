//! Cost management and budget thresholds
//!
//! This module provides:
//! - Token usage tracking per model call, including prompt-cache categories
//! - Cost calculation from a model's per-million-token rates
//! - Budget state with one-shot warning and stop latches
//! - Grouped views and report export
//!
//! Threshold latches only signal. Refusing further spend is up to the caller.

mod tracker;
mod types;

pub use tracker::{BudgetCallback, CostSettings, CostTracker};
pub use types::{
    BudgetProjection, BudgetState, CostBreakdown, CostContext, CostEntry, CostReport,
    ModelCostSummary, TokenUsage, VendorCostSummary,
};
