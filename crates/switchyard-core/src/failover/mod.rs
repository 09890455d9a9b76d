//! Multi-vendor failover with live health tracking
//!
//! The engine walks an ordered list of vendors, retrying each a bounded number
//! of times with linear backoff, and substitutes an equivalent model when it
//! moves to another vendor. Every attempt feeds a per-vendor health record
//! which in turn shapes the order of later executions:
//!
//! - **Sequential**: primary, then healthy backups
//! - **RoundRobin**: rotating start vendor
//! - **BestPerformance**: success rate, then latency
//! - **CostOptimized**: healthy vendors in configured order
//!
//! If filtering removes every vendor the configured order is used unchanged.

mod engine;
mod health;
mod strategy;
mod types;

pub use engine::{ExecuteOptions, FailoverEngine, StreamingExecution};
pub use health::{AttemptHistory, HealthStore, MAX_CONSECUTIVE_FAILURES, VendorHealth};
pub use strategy::{FailoverConfig, FailoverStrategy, compare_performance, order_vendors};
pub use types::{AggregateFailoverError, Attempt, FailoverResult};
