//! Switchyard Core Library
//!
//! This crate sits between application code and a set of remote LLM vendors:
//! - Model catalog boundary (vendor model descriptors)
//! - Model resolution (cost/quality/capability aware selection)
//! - Multi-vendor failover with live health tracking
//! - Cost metering and budget thresholds
//! - Swarm composition across vendors
//!
//! All state is process-local. The transport that actually talks to a vendor
//! is supplied by the caller through [`llm::Transport`].

pub mod catalog;
pub mod config;
pub mod cost;
pub mod error;
pub mod failover;
pub mod llm;
pub mod resolver;
pub mod swarm;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{Model, ModelCatalog, StaticCatalog};
    pub use crate::config::Config;
    pub use crate::cost::{BudgetState, CostTracker, TokenUsage};
    pub use crate::error::{Error, Result};
    pub use crate::failover::{ExecuteOptions, FailoverConfig, FailoverEngine, FailoverStrategy};
    pub use crate::llm::{Message, Transport};
    pub use crate::resolver::{ModelResolver, TaskRequest, TaskType};
    pub use crate::swarm::{SwarmComposer, SwarmConfig};
}
