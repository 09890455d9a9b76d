//! Transport abstraction used by the failover engine
//!
//! A transport performs one invocation against one vendor model and hands back
//! a live delta stream plus the deferred final message.

use async_trait::async_trait;
use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::catalog::Model;

use super::types::{CompletedMessage, Message};

/// Closed classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptErrorKind {
    /// Network or protocol failure
    Transport,
    /// The per-attempt deadline elapsed
    Timeout,
    /// The vendor or model cannot serve the request
    VendorUnavailable,
    /// The vendor throttled the request
    RateLimited,
}

impl AttemptErrorKind {
    /// Classify a free-text vendor error message
    pub fn classify(message: &str) -> Self {
        let msg = message.to_lowercase();

        if ["rate limit", "rate-limit", "too many requests", "429"]
            .iter()
            .any(|p| msg.contains(p))
        {
            return Self::RateLimited;
        }

        if ["timeout", "timed out", "deadline"]
            .iter()
            .any(|p| msg.contains(p))
        {
            return Self::Timeout;
        }

        if [
            "model not found",
            "unavailable",
            "not available",
            "no available provider",
            "overloaded",
            "capacity",
        ]
        .iter()
        .any(|p| msg.contains(p))
        {
            return Self::VendorUnavailable;
        }

        Self::Transport
    }
}

impl std::fmt::Display for AttemptErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Timeout => write!(f, "timeout"),
            Self::VendorUnavailable => write!(f, "vendor_unavailable"),
            Self::RateLimited => write!(f, "rate_limited"),
        }
    }
}

/// Error raised by a transport for a single invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Failure class
    pub kind: AttemptErrorKind,
    /// Vendor supplied diagnostic text
    pub message: String,
}

impl TransportError {
    /// Create an error of an explicit kind
    pub fn new(kind: AttemptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an error whose kind is inferred from its message
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: AttemptErrorKind::classify(&message),
            message,
        }
    }

    /// Network or protocol failure
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(AttemptErrorKind::Transport, message)
    }

    /// Deadline elapsed
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(AttemptErrorKind::Timeout, message)
    }

    /// Vendor cannot serve the request
    pub fn vendor_unavailable(message: impl Into<String>) -> Self {
        Self::new(AttemptErrorKind::VendorUnavailable, message)
    }

    /// Vendor throttled the request
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(AttemptErrorKind::RateLimited, message)
    }
}

/// Options for a single invocation
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u64>,
    /// Cancelled when the attempt's deadline elapses
    pub cancellation: CancellationToken,
}

impl InvokeOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Copy of these options bound to a fresh cancellation token
    pub(crate) fn for_attempt(&self, cancellation: CancellationToken) -> Self {
        Self {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            cancellation,
        }
    }
}

/// A live invocation: streamed deltas plus the deferred final message
///
/// The completion future must resolve whether or not the delta stream is
/// polled.
pub struct Invocation {
    /// Incremental content as it arrives
    pub deltas: BoxStream<'static, String>,
    /// Final message with usage, or the error that ended the stream
    pub completion: BoxFuture<'static, Result<CompletedMessage, TransportError>>,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation").finish_non_exhaustive()
    }
}

impl Invocation {
    /// Create an invocation from its parts
    pub fn new(
        deltas: BoxStream<'static, String>,
        completion: BoxFuture<'static, Result<CompletedMessage, TransportError>>,
    ) -> Self {
        Self { deltas, completion }
    }

    /// An invocation that already finished; the content is emitted as one delta
    pub fn completed(message: CompletedMessage) -> Self {
        let deltas = stream::iter(vec![message.content.clone()]).boxed();
        Self {
            deltas,
            completion: future::ready(Ok(message)).boxed(),
        }
    }
}

/// Performs model invocations against vendors
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start an invocation of `model` with the given conversation
    async fn invoke(
        &self,
        model: &Model,
        conversation: &[Message],
        options: &InvokeOptions,
    ) -> Result<Invocation, TransportError>;
}
