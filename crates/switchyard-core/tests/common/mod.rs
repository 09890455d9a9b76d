//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::FutureExt;
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use switchyard_core::catalog::{Model, StaticCatalog};
use switchyard_core::cost::TokenUsage;
use switchyard_core::llm::{
    CompletedMessage, Invocation, InvokeOptions, Message, Transport, TransportError,
};
use switchyard_core::resolver::ModelResolver;

static TRACING: Once = Once::new();

/// Route library logs to the test writer
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("switchyard_core=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// What the transport does for one call
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail(TransportError),
    /// Never answers within any sane deadline
    Hang,
    /// Streams the chunks, then completes successfully
    Stream(Vec<&'static str>),
    /// Streams the chunks, then the completion fails
    StreamThenFail(Vec<&'static str>),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub vendor: String,
    pub model_id: String,
    pub cancellation: CancellationToken,
}

/// Transport replaying per-vendor scripts; `fallback` applies once a script runs out
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Mutex<HashMap<String, Step>>,
    calls: Mutex<Vec<Call>>,
    usage: TokenUsage,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            usage: TokenUsage::new(1_000, 500),
        }
    }

    /// Every call to `vendor` behaves like `step`
    pub fn always(self, vendor: &str, step: Step) -> Self {
        self.fallback.lock().unwrap().insert(vendor.to_string(), step);
        self
    }

    /// Queue steps for `vendor` ahead of its fallback
    pub fn then(self, vendor: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(vendor.to_string())
            .or_default()
            .extend(steps);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn vendors_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.vendor).collect()
    }

    fn next_step(&self, vendor: &str) -> Step {
        let queued = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(vendor)
            .and_then(VecDeque::pop_front);
        queued.unwrap_or_else(|| {
            self.fallback
                .lock()
                .unwrap()
                .get(vendor)
                .cloned()
                .unwrap_or(Step::Succeed)
        })
    }

    fn message(&self, model: &Model, content: &str) -> CompletedMessage {
        CompletedMessage::new(&model.id, content, self.usage)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn invoke(
        &self,
        model: &Model,
        _conversation: &[Message],
        options: &InvokeOptions,
    ) -> Result<Invocation, TransportError> {
        self.calls.lock().unwrap().push(Call {
            vendor: model.vendor.clone(),
            model_id: model.id.clone(),
            cancellation: options.cancellation.clone(),
        });

        match self.next_step(&model.vendor) {
            Step::Succeed => Ok(Invocation::completed(self.message(model, "done"))),
            Step::Fail(err) => Err(err),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(Invocation::completed(self.message(model, "late")))
            }
            Step::Stream(chunks) => {
                let message = self.message(model, &chunks.concat());
                let deltas = stream::iter(chunks.into_iter().map(String::from)).boxed();
                Ok(Invocation::new(deltas, async move { Ok(message) }.boxed()))
            }
            Step::StreamThenFail(chunks) => {
                let deltas = stream::iter(chunks.into_iter().map(String::from)).boxed();
                let completion =
                    async { Err(TransportError::transport("stream reset by peer")) }.boxed();
                Ok(Invocation::new(deltas, completion))
            }
        }
    }
}

pub fn resolver() -> Arc<ModelResolver> {
    Arc::new(ModelResolver::new(Arc::new(StaticCatalog::with_defaults())))
}

pub fn sonnet() -> Model {
    use switchyard_core::catalog::ModelCatalog;
    StaticCatalog::with_defaults()
        .get_model("anthropic", "claude-sonnet-4-20250514")
        .expect("default catalog has sonnet")
}

pub fn conversation() -> Vec<Message> {
    vec![
        Message::system("You are terse."),
        Message::user("Summarize the incident."),
    ]
}
