//! Failover execution across vendors

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{BoxStream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::Model;
use crate::cost::{BudgetState, CostContext, CostTracker};
use crate::error::{Error, Result};
use crate::llm::{
    AttemptErrorKind, CompletedMessage, InvokeOptions, Invocation, Message, Transport,
    TransportError,
};
use crate::resolver::ModelResolver;

use super::health::{AttemptHistory, HealthStore, VendorHealth};
use super::strategy::{FailoverConfig, FailoverStrategy, compare_performance, order_vendors};
use super::types::{AggregateFailoverError, Attempt, FailoverResult};

/// Per-execution options
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Passed to every attempt; its cancellation token parents the per-attempt tokens
    pub invoke: InvokeOptions,
    /// Attribution for the cost entry recorded on success
    pub cost_context: CostContext,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invoke(mut self, invoke: InvokeOptions) -> Self {
        self.invoke = invoke;
        self
    }

    pub fn with_cost_context(mut self, context: CostContext) -> Self {
        self.cost_context = context;
        self
    }
}

/// A streaming execution whose attempt has been established
///
/// Deltas are only ever from the vendor named here. `result` resolves once the
/// stream finishes, whether or not `deltas` is drained.
pub struct StreamingExecution {
    pub vendor: String,
    pub model: Model,
    pub deltas: BoxStream<'static, String>,
    pub result: BoxFuture<'static, Result<FailoverResult>>,
}

impl std::fmt::Debug for StreamingExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingExecution")
            .field("vendor", &self.vendor)
            .field("model", &self.model.id)
            .finish_non_exhaustive()
    }
}

/// An attempt the transport accepted and that settled successfully
struct Established<T> {
    vendor: String,
    model: Model,
    output: T,
    token: CancellationToken,
    start: Instant,
    deadline: Instant,
    attempts: Vec<Attempt>,
}

/// Executes a request against an ordered list of vendors until one succeeds
///
/// Clones share health, history and the round-robin cursor.
#[derive(Clone)]
pub struct FailoverEngine {
    config: Arc<FailoverConfig>,
    resolver: Arc<ModelResolver>,
    transport: Arc<dyn Transport>,
    cost_tracker: Option<CostTracker>,
    health: Arc<HealthStore>,
    history: Arc<AttemptHistory>,
    rotation: Arc<AtomicUsize>,
}

impl std::fmt::Debug for FailoverEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverEngine")
            .field("config", &self.config)
            .field("cost_tracker", &self.cost_tracker.is_some())
            .finish_non_exhaustive()
    }
}

impl FailoverEngine {
    /// Create an engine with fresh health records for the configured vendors
    pub fn new(
        config: FailoverConfig,
        resolver: Arc<ModelResolver>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let health = HealthStore::new(
            &config.vendors(),
            config.health_threshold,
            config.latency_alpha,
        );
        let history = AttemptHistory::new(config.history_window);
        Self {
            config: Arc::new(config),
            resolver,
            transport,
            cost_tracker: None,
            health: Arc::new(health),
            history: Arc::new(history),
            rotation: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Record the cost of every successful call
    pub fn with_cost_tracker(mut self, tracker: CostTracker) -> Self {
        self.cost_tracker = Some(tracker);
        self
    }

    /// Share a health store with other engines
    ///
    /// The store starts tracking this engine's vendors. Its own threshold and
    /// smoothing factor take over from the ones in this engine's config.
    pub fn with_health_store(mut self, health: Arc<HealthStore>) -> Self {
        health.track(&self.config.vendors());
        if health.threshold() != self.config.health_threshold
            || health.latency_alpha() != self.config.latency_alpha
        {
            warn!(
                store_threshold = health.threshold(),
                config_threshold = self.config.health_threshold,
                store_alpha = health.latency_alpha(),
                config_alpha = self.config.latency_alpha,
                "Shared health store settings override engine config"
            );
        }
        self.health = health;
        self
    }

    pub fn config(&self) -> &FailoverConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<ModelResolver> {
        &self.resolver
    }

    pub fn cost_tracker(&self) -> Option<&CostTracker> {
        self.cost_tracker.as_ref()
    }

    /// Vendor order for the next execution
    ///
    /// Advances the round-robin cursor when that strategy is active.
    pub fn candidate_order(&self) -> Vec<String> {
        let rotation = match self.config.strategy {
            FailoverStrategy::RoundRobin => self.rotation.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
        let health: HashMap<String, VendorHealth> = self
            .health
            .snapshot()
            .into_iter()
            .map(|h| (h.vendor.clone(), h))
            .collect();
        order_vendors(self.config.strategy, &self.config.vendors(), &health, rotation)
    }

    /// Run `conversation` against `model`, failing over to equivalents on other vendors
    pub async fn execute_with_failover(
        &self,
        model: &Model,
        conversation: &[Message],
        options: &ExecuteOptions,
    ) -> Result<FailoverResult> {
        let started = Instant::now();
        let timeout = self.config.attempt_timeout;
        let established = self
            .run_attempts(model, conversation, options, |invocation, deadline| async move {
                match tokio::time::timeout_at(deadline, invocation.completion).await {
                    Ok(result) => result,
                    Err(_) => Err(timeout_error(timeout)),
                }
            })
            .await?;

        let Established {
            vendor,
            model: used,
            output: message,
            start,
            mut attempts,
            ..
        } = established;
        let latency_ms = elapsed_ms(start);
        let attempt = Attempt::succeeded(&vendor, &used.id, latency_ms);
        self.record_attempt(&attempt);
        attempts.push(attempt);

        let cost_status = self.record_cost(&used, &message, &options.cost_context, latency_ms);
        info!(
            vendor = %vendor,
            model = %used.id,
            attempts = attempts.len(),
            "Failover execution succeeded"
        );
        Ok(FailoverResult {
            message,
            model: used,
            attempts,
            successful_vendor: vendor,
            total_latency_ms: elapsed_ms(started),
            cost_status,
        })
    }

    /// Like [`execute_with_failover`](Self::execute_with_failover) but streams deltas
    ///
    /// Failover only happens while establishing an attempt. Once a vendor
    /// starts streaming, its outcome is final for this execution.
    pub async fn execute_streaming(
        &self,
        model: &Model,
        conversation: &[Message],
        options: &ExecuteOptions,
    ) -> Result<StreamingExecution> {
        let started = Instant::now();
        let established = self
            .run_attempts(model, conversation, options, |invocation, _| async move {
                Ok(invocation)
            })
            .await?;

        debug!(
            vendor = %established.vendor,
            model = %established.model.id,
            "Stream established"
        );
        Ok(self.stream_from(established, started, options.cost_context.clone()))
    }

    /// Health of one vendor
    pub fn health(&self, vendor: &str) -> Option<VendorHealth> {
        self.health.get(vendor)
    }

    /// Health of every configured vendor, primary first
    pub fn all_health(&self) -> Vec<VendorHealth> {
        self.config
            .vendors()
            .iter()
            .filter_map(|v| self.health.get(v))
            .collect()
    }

    /// Forget all health statistics
    pub fn reset_health(&self) {
        self.health.reset();
        info!("Vendor health reset");
    }

    /// Best healthy vendor among `among`, by success rate then latency
    pub fn best_vendor(&self, among: &[String]) -> Option<String> {
        let mut candidates: Vec<VendorHealth> = among
            .iter()
            .filter_map(|v| self.health.get(v))
            .filter(|h| h.healthy)
            .collect();
        candidates.sort_by(compare_performance);
        candidates.into_iter().next().map(|h| h.vendor)
    }

    /// Attempts from the history window, oldest first
    pub fn attempt_history(&self) -> Vec<Attempt> {
        self.history.snapshot()
    }

    pub fn history_for(&self, vendor: &str) -> Vec<Attempt> {
        self.history.for_vendor(vendor)
    }

    /// Drop every attempt from the history
    pub fn clear_history(&self) {
        self.history.clear();
        debug!("Attempt history cleared");
    }

    /// Walk the candidate vendors with bounded retries until an attempt settles
    ///
    /// `settle` carries an accepted invocation to its output before the
    /// attempt's deadline. Failed attempts are recorded here; the caller
    /// records the successful one.
    async fn run_attempts<T, F, Fut>(
        &self,
        model: &Model,
        conversation: &[Message],
        options: &ExecuteOptions,
        settle: F,
    ) -> Result<Established<T>>
    where
        F: Fn(Invocation, Instant) -> Fut,
        Fut: Future<Output = std::result::Result<T, TransportError>>,
    {
        let order = self.candidate_order();
        let retries = self.config.effective_retries();
        let mut attempts = Vec::new();

        debug!(
            model = %model.qualified_id(),
            strategy = %self.config.strategy,
            order = ?order,
            "Starting failover execution"
        );

        'vendors: for vendor in &order {
            for attempt_index in 1..=retries {
                if options.invoke.cancellation.is_cancelled() {
                    warn!(vendor = %vendor, "Execution cancelled by caller");
                    break 'vendors;
                }

                let target = match self.resolve_for(vendor, model) {
                    Ok(target) => target,
                    Err(attempt) => {
                        attempts.push(attempt);
                        continue 'vendors;
                    }
                };

                let token = options.invoke.cancellation.child_token();
                let invoke_options = options.invoke.for_attempt(token.clone());
                let start = Instant::now();
                let deadline = start + self.config.attempt_timeout;

                debug!(vendor = %vendor, model = %target.id, "Attempting invocation");

                let outcome = match tokio::time::timeout_at(
                    deadline,
                    self.transport.invoke(&target, conversation, &invoke_options),
                )
                .await
                {
                    Ok(Ok(invocation)) => settle(invocation, deadline).await,
                    Ok(Err(error)) => Err(error),
                    Err(_) => Err(timeout_error(self.config.attempt_timeout)),
                };

                let error = match outcome {
                    Ok(output) => {
                        return Ok(Established {
                            vendor: vendor.clone(),
                            model: target,
                            output,
                            token,
                            start,
                            deadline,
                            attempts,
                        });
                    }
                    Err(error) => error,
                };

                if error.kind == AttemptErrorKind::Timeout {
                    token.cancel();
                }
                warn!(
                    vendor = %vendor,
                    model = %target.id,
                    kind = %error.kind,
                    error = %error.message,
                    "Attempt failed"
                );
                let attempt = Attempt::failed(vendor, &target.id, elapsed_ms(start), error);
                self.record_attempt(&attempt);
                attempts.push(attempt);

                if attempt_index < retries {
                    self.backoff(vendor, attempt_index).await;
                }
            }
        }

        let err = AggregateFailoverError::new(attempts);
        warn!(attempts = err.attempts.len(), error = %err, "Failover exhausted");
        Err(err.into())
    }

    /// Equivalent model on `vendor`, or a failed attempt that skips health
    fn resolve_for(&self, vendor: &str, model: &Model) -> std::result::Result<Model, Attempt> {
        self.resolver.find_equivalent(model, vendor).map_err(|err| {
            warn!(vendor = %vendor, error = %err, "No equivalent model, skipping vendor");
            let attempt = Attempt::failed(
                vendor,
                &model.id,
                0,
                TransportError::vendor_unavailable(err.to_string()),
            );
            self.history.push(attempt.clone());
            attempt
        })
    }

    fn record_attempt(&self, attempt: &Attempt) {
        self.health
            .record(&attempt.vendor, attempt.success, attempt.latency_ms);
        self.history.push(attempt.clone());
    }

    fn record_cost(
        &self,
        model: &Model,
        message: &CompletedMessage,
        context: &CostContext,
        latency_ms: u64,
    ) -> Option<BudgetState> {
        let tracker = self.cost_tracker.as_ref()?;
        tracker.record_cost(model, message.usage, context.clone().with_latency(latency_ms));
        Some(tracker.status())
    }

    async fn backoff(&self, vendor: &str, attempt_index: u32) {
        let delay = self.config.retry_delay * attempt_index;
        if delay.is_zero() {
            return;
        }
        debug!(vendor = %vendor, wait_ms = delay.as_millis() as u64, "Retrying after backoff");
        tokio::time::sleep(delay).await;
    }

    fn stream_from(
        &self,
        established: Established<Invocation>,
        started: Instant,
        context: CostContext,
    ) -> StreamingExecution {
        let Established {
            vendor,
            model,
            output: Invocation { deltas, completion },
            token,
            start,
            deadline,
            mut attempts,
        } = established;

        let cancelled = token.clone();
        let deltas = async_stream::stream! {
            let mut inner = deltas;
            loop {
                let next = tokio::select! {
                    _ = cancelled.cancelled() => None,
                    next = inner.next() => next,
                };
                match next {
                    Some(delta) => yield delta,
                    None => break,
                }
            }
        }
        .boxed();

        let engine = self.clone();
        let result_vendor = vendor.clone();
        let result_model = model.clone();
        let result = async move {
            let outcome = match tokio::time::timeout_at(deadline, completion).await {
                Ok(result) => result,
                Err(_) => {
                    token.cancel();
                    Err(timeout_error(engine.config.attempt_timeout))
                }
            };
            let latency_ms = elapsed_ms(start);

            match outcome {
                Ok(message) => {
                    let attempt = Attempt::succeeded(&result_vendor, &result_model.id, latency_ms);
                    engine.record_attempt(&attempt);
                    attempts.push(attempt);
                    let cost_status =
                        engine.record_cost(&result_model, &message, &context, latency_ms);
                    Ok(FailoverResult {
                        message,
                        model: result_model,
                        attempts,
                        successful_vendor: result_vendor,
                        total_latency_ms: elapsed_ms(started),
                        cost_status,
                    })
                }
                Err(error) => {
                    warn!(vendor = %result_vendor, error = %error, "Stream failed after start");
                    let attempt = Attempt::failed(&result_vendor, &result_model.id, latency_ms, error);
                    engine.record_attempt(&attempt);
                    attempts.push(attempt);
                    Err(Error::from(AggregateFailoverError::new(attempts)))
                }
            }
        }
        .boxed();

        StreamingExecution {
            vendor,
            model,
            deltas,
            result,
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn timeout_error(timeout: std::time::Duration) -> TransportError {
    TransportError::timeout(format!("attempt exceeded {}ms", timeout.as_millis()))
}
