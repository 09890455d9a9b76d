//! Error types for Switchyard

use thiserror::Error;

use crate::failover::AggregateFailoverError;

/// Result type alias using Switchyard's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Switchyard error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Resolution errors (E1100-E1199)
    #[error("No model satisfies the request: {0}")]
    NoModelFound(String),

    #[error("Vendor '{0}' has no models in the catalog")]
    NoModelsForVendor(String),

    // Failover errors (E1200-E1299)
    #[error(transparent)]
    AggregateFailover(#[from] AggregateFailoverError),

    // Swarm errors (E1300-E1399)
    #[error("No providers available for swarm: {0}")]
    NoProvidersAvailable(String),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoModelFound(_) => "E1101",
            Self::NoModelsForVendor(_) => "E1102",
            Self::AggregateFailover(_) => "E1200",
            Self::NoProvidersAvailable(_) => "E1300",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NoModelFound(_) => Some(
                "Relax required capabilities, lower min_context_window or widen the vendor allow-list"
                    .to_string(),
            ),
            Self::NoModelsForVendor(vendor) => {
                Some(format!("Register at least one model for vendor '{}'", vendor))
            }
            Self::AggregateFailover(err) => err
                .last_error()
                .map(|message| format!("Last vendor error: {}", message)),
            Self::NoProvidersAvailable(_) => {
                Some("Include a vendor with a model for this task type".to_string())
            }
        }
    }
}
