//! Invocation boundary
//!
//! This module provides:
//! - Conversation message types handed to a vendor
//! - The [`Transport`] trait implemented by callers to reach a vendor
//! - Closed classification of per-attempt failures
//!
//! The core never speaks a vendor wire protocol itself.

mod transport;
mod types;

pub use transport::{AttemptErrorKind, Invocation, InvokeOptions, Transport, TransportError};
pub use types::{CompletedMessage, FinishReason, Message, MessageRole};
