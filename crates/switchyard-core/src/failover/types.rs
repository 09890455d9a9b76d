//! Attempts, results and the terminal failover error

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Model;
use crate::cost::BudgetState;
use crate::llm::{CompletedMessage, TransportError};

/// One try against one vendor/model pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub vendor: String,
    pub model_id: String,
    pub success: bool,
    pub latency_ms: u64,
    pub error: Option<TransportError>,
    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    /// A successful attempt
    pub fn succeeded(vendor: impl Into<String>, model_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            vendor: vendor.into(),
            model_id: model_id.into(),
            success: true,
            latency_ms,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// A failed attempt
    pub fn failed(
        vendor: impl Into<String>,
        model_id: impl Into<String>,
        latency_ms: u64,
        error: TransportError,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            model_id: model_id.into(),
            success: false,
            latency_ms,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of a successful failover run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverResult {
    pub message: CompletedMessage,
    /// The model actually invoked (may differ from the requested one)
    pub model: Model,
    /// Every attempt of this run in order, the successful one last
    pub attempts: Vec<Attempt>,
    pub successful_vendor: String,
    pub total_latency_ms: u64,
    /// Budget state after recording this call, when a tracker is attached
    pub cost_status: Option<BudgetState>,
}

/// Every vendor/retry combination failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("All {} attempts failed across vendors [{}]", attempts.len(), vendors_tried(attempts).join(", "))]
pub struct AggregateFailoverError {
    /// Ordered attempts for diagnostics
    pub attempts: Vec<Attempt>,
}

impl AggregateFailoverError {
    /// Wrap the attempts of an exhausted run
    pub fn new(attempts: Vec<Attempt>) -> Self {
        Self { attempts }
    }

    /// Distinct vendors in attempt order
    pub fn vendors_tried(&self) -> Vec<String> {
        vendors_tried(&self.attempts)
    }

    /// Message of the final failed attempt
    pub fn last_error(&self) -> Option<String> {
        self.attempts
            .iter()
            .rev()
            .find_map(|a| a.error.as_ref().map(ToString::to_string))
    }
}

fn vendors_tried(attempts: &[Attempt]) -> Vec<String> {
    let mut vendors: Vec<String> = Vec::new();
    for attempt in attempts {
        if !vendors.contains(&attempt.vendor) {
            vendors.push(attempt.vendor.clone());
        }
    }
    vendors
}
