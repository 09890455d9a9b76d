//! Cost tracker with one-shot budget latches

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use super::types::{
    BudgetProjection, BudgetState, CostBreakdown, CostContext, CostEntry, CostReport,
    ModelCostSummary, TokenUsage, VendorCostSummary,
};
use crate::catalog::Model;

/// Callback fired when a budget threshold is first crossed
pub type BudgetCallback = Arc<dyn Fn(&BudgetState) + Send + Sync>;

/// Runtime settings for the cost tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostSettings {
    /// Budget ceiling in USD
    pub budget_limit_usd: f64,
    /// Fraction of budget at which the warning latch fires
    pub warning_threshold: f64,
    /// Fraction of budget at which the stop latch fires
    pub stop_threshold: f64,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            budget_limit_usd: 10.0,
            warning_threshold: 0.75,
            stop_threshold: 0.95,
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    entries: Vec<CostEntry>,
    total_cost_usd: f64,
    budget_limit_usd: f64,
    warning_triggered: bool,
    stop_triggered: bool,
}

impl Ledger {
    fn status(&self) -> BudgetState {
        let percent_used = if self.budget_limit_usd > 0.0 {
            self.total_cost_usd / self.budget_limit_usd
        } else {
            0.0
        };

        BudgetState {
            total_cost_usd: self.total_cost_usd,
            budget_limit_usd: self.budget_limit_usd,
            percent_used,
            remaining_usd: (self.budget_limit_usd - self.total_cost_usd).max(0.0),
            entry_count: self.entries.len(),
            warning_triggered: self.warning_triggered,
            stop_triggered: self.stop_triggered,
        }
    }
}

#[derive(Default)]
struct Callbacks {
    on_warning: Option<BudgetCallback>,
    on_stop: Option<BudgetCallback>,
}

/// Cost tracker for recording usage and signalling budget thresholds
///
/// The tracker only signals; it never refuses to record spend past the stop
/// threshold. Clones share the same ledger.
#[derive(Clone)]
pub struct CostTracker {
    warning_threshold: f64,
    stop_threshold: f64,
    ledger: Arc<RwLock<Ledger>>,
    callbacks: Arc<RwLock<Callbacks>>,
}

impl std::fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracker")
            .field("warning_threshold", &self.warning_threshold)
            .field("stop_threshold", &self.stop_threshold)
            .field("status", &self.status())
            .finish()
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::with_settings(CostSettings::default())
    }
}

impl CostTracker {
    /// Create a tracker with the given budget and default thresholds
    pub fn new(budget_limit_usd: f64) -> Self {
        Self::with_settings(CostSettings {
            budget_limit_usd,
            ..CostSettings::default()
        })
    }

    /// Create a tracker from explicit settings
    pub fn with_settings(settings: CostSettings) -> Self {
        Self {
            warning_threshold: settings.warning_threshold,
            stop_threshold: settings.stop_threshold,
            ledger: Arc::new(RwLock::new(Ledger {
                budget_limit_usd: settings.budget_limit_usd,
                ..Ledger::default()
            })),
            callbacks: Arc::new(RwLock::new(Callbacks::default())),
        }
    }

    /// Create a cost tracker from config
    pub fn from_config(config: &crate::config::CostSection) -> Self {
        Self::with_settings(config.settings())
    }

    /// Register the warning-threshold callback
    pub fn on_warning(&self, callback: impl Fn(&BudgetState) + Send + Sync + 'static) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .on_warning = Some(Arc::new(callback));
    }

    /// Register the stop-threshold callback
    pub fn on_stop(&self, callback: impl Fn(&BudgetState) + Send + Sync + 'static) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .on_stop = Some(Arc::new(callback));
    }

    fn read_ledger(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_ledger(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.ledger.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a billed call and fire any newly crossed threshold
    pub fn record_cost(&self, model: &Model, usage: TokenUsage, context: CostContext) -> CostEntry {
        let entry = CostEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            vendor: model.vendor.clone(),
            model_id: model.id.clone(),
            usage,
            cost: CostBreakdown::calculate(model, &usage),
            task_id: context.task_id,
            agent_id: context.agent_id,
            swarm_id: context.swarm_id,
            latency_ms: context.latency_ms,
            metadata: context.metadata,
        };

        let (fire_warning, fire_stop, status) = {
            let mut ledger = self.write_ledger();
            ledger.total_cost_usd += entry.total_cost_usd();
            ledger.entries.push(entry.clone());

            let percent_used = ledger.status().percent_used;
            let fire_warning = !ledger.warning_triggered
                && ledger.budget_limit_usd > 0.0
                && percent_used >= self.warning_threshold;
            let fire_stop = !ledger.stop_triggered
                && ledger.budget_limit_usd > 0.0
                && percent_used >= self.stop_threshold;
            ledger.warning_triggered |= fire_warning;
            ledger.stop_triggered |= fire_stop;

            (fire_warning, fire_stop, ledger.status())
        };

        debug!(
            vendor = %entry.vendor,
            model = %entry.model_id,
            cost_usd = entry.total_cost_usd(),
            total_usd = status.total_cost_usd,
            "Recorded cost"
        );

        if fire_warning || fire_stop {
            let callbacks = self.callbacks.read().unwrap_or_else(PoisonError::into_inner);
            if fire_warning {
                warn!(
                    percent_used = status.percent_used,
                    threshold = self.warning_threshold,
                    "Budget warning threshold reached"
                );
                if let Some(callback) = &callbacks.on_warning {
                    callback(&status);
                }
            }
            if fire_stop {
                warn!(
                    percent_used = status.percent_used,
                    threshold = self.stop_threshold,
                    "Budget stop threshold reached"
                );
                if let Some(callback) = &callbacks.on_stop {
                    callback(&status);
                }
            }
        }

        entry
    }

    /// Estimate the cost of a call without recording it
    pub fn estimate_cost(&self, model: &Model, input_tokens: u64, output_tokens: u64) -> f64 {
        model.estimate_cost(input_tokens, output_tokens)
    }

    /// Check whether a prospective call would push spend past the budget
    pub fn would_exceed_budget(
        &self,
        model: &Model,
        input_tokens: u64,
        output_tokens: u64,
    ) -> BudgetProjection {
        let ledger = self.read_ledger();
        let projected_total_usd =
            ledger.total_cost_usd + model.estimate_cost(input_tokens, output_tokens);

        BudgetProjection {
            exceeds: projected_total_usd > ledger.budget_limit_usd,
            projected_total_usd,
            remaining_usd: (ledger.budget_limit_usd - projected_total_usd).max(0.0),
        }
    }

    /// Current budget state
    pub fn status(&self) -> BudgetState {
        self.read_ledger().status()
    }

    /// Change the budget ceiling; clears both latches
    pub fn set_budget_limit(&self, budget_limit_usd: f64) {
        let mut ledger = self.write_ledger();
        ledger.budget_limit_usd = budget_limit_usd;
        ledger.warning_triggered = false;
        ledger.stop_triggered = false;
    }

    /// Re-arm both threshold latches
    pub fn reset_thresholds(&self) {
        let mut ledger = self.write_ledger();
        ledger.warning_triggered = false;
        ledger.stop_triggered = false;
    }

    /// All entries in recording order
    pub fn entries(&self) -> Vec<CostEntry> {
        self.read_ledger().entries.clone()
    }

    /// Spend grouped by vendor, most expensive first
    pub fn by_provider(&self) -> Vec<VendorCostSummary> {
        let ledger = self.read_ledger();
        let mut order: Vec<String> = Vec::new();
        let mut summaries: HashMap<String, VendorCostSummary> = HashMap::new();

        for entry in &ledger.entries {
            summaries
                .entry(entry.vendor.clone())
                .or_insert_with(|| {
                    order.push(entry.vendor.clone());
                    VendorCostSummary::new(entry.vendor.clone())
                })
                .add(entry);
        }

        let mut result: Vec<VendorCostSummary> = order
            .into_iter()
            .filter_map(|vendor| summaries.remove(&vendor))
            .collect();
        result.sort_by(|a, b| b.total_cost_usd.total_cmp(&a.total_cost_usd));
        result
    }

    /// Spend grouped by model, most expensive first
    pub fn by_model(&self) -> Vec<ModelCostSummary> {
        let ledger = self.read_ledger();
        let mut order: Vec<(String, String)> = Vec::new();
        let mut summaries: HashMap<(String, String), ModelCostSummary> = HashMap::new();

        for entry in &ledger.entries {
            let key = (entry.vendor.clone(), entry.model_id.clone());
            summaries
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    ModelCostSummary::new(entry.vendor.clone(), entry.model_id.clone())
                })
                .add(entry);
        }

        let mut result: Vec<ModelCostSummary> = order
            .into_iter()
            .filter_map(|key| summaries.remove(&key))
            .collect();
        result.sort_by(|a, b| b.total_cost_usd.total_cmp(&a.total_cost_usd));
        result
    }

    fn filter_entries(&self, predicate: impl Fn(&CostEntry) -> bool) -> Vec<CostEntry> {
        self.read_ledger()
            .entries
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Entries correlated with a task
    pub fn for_task(&self, task_id: &str) -> Vec<CostEntry> {
        self.filter_entries(|e| e.task_id.as_deref() == Some(task_id))
    }

    /// Entries correlated with an agent
    pub fn for_agent(&self, agent_id: &str) -> Vec<CostEntry> {
        self.filter_entries(|e| e.agent_id.as_deref() == Some(agent_id))
    }

    /// Entries correlated with a swarm
    pub fn for_swarm(&self, swarm_id: &str) -> Vec<CostEntry> {
        self.filter_entries(|e| e.swarm_id.as_deref() == Some(swarm_id))
    }

    /// Snapshot of status, groupings and entries
    pub fn export_report(&self) -> CostReport {
        CostReport {
            generated_at: Utc::now(),
            status: self.status(),
            by_provider: self.by_provider(),
            by_model: self.by_model(),
            entries: self.entries(),
        }
    }

    /// Report serialized as pretty JSON
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export_report())
    }

    /// Clear all entries and latches (useful for testing)
    pub fn clear(&self) {
        let mut ledger = self.write_ledger();
        ledger.entries.clear();
        ledger.total_cost_usd = 0.0;
        ledger.warning_triggered = false;
        ledger.stop_triggered = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// $1 per million input tokens, so N million input tokens cost exactly N dollars
    fn unit_model(vendor: &str, id: &str) -> Model {
        Model::new(vendor, id).with_pricing(1.0, 0.0)
    }

    fn dollars(amount: u64) -> TokenUsage {
        TokenUsage::new(amount * 1_000_000, 0)
    }

    #[test]
    fn test_record_cost_entry() {
        let tracker = CostTracker::new(10.0);
        let model = Model::new("anthropic", "claude-sonnet-4-20250514").with_pricing(3.0, 15.0);

        let entry = tracker.record_cost(
            &model,
            TokenUsage::new(1000, 500),
            CostContext::new().with_task("t1").with_latency(250),
        );

        assert_eq!(entry.vendor, "anthropic");
        assert_eq!(entry.model_id, "claude-sonnet-4-20250514");
        assert!((entry.cost.input_cost_usd - 0.003).abs() < 1e-12);
        assert!((entry.cost.output_cost_usd - 0.0075).abs() < 1e-12);
        assert_eq!(entry.task_id.as_deref(), Some("t1"));
        assert_eq!(entry.latency_ms, Some(250));
        assert_eq!(tracker.status().entry_count, 1);
    }

    #[test]
    fn test_status_is_stable_without_records() {
        let tracker = CostTracker::new(10.0);
        tracker.record_cost(&unit_model("a", "m"), dollars(2), CostContext::new());

        assert_eq!(tracker.status(), tracker.status());
    }

    #[test]
    fn test_warning_scenario() {
        let tracker = CostTracker::with_settings(CostSettings {
            budget_limit_usd: 10.0,
            warning_threshold: 0.5,
            stop_threshold: 0.95,
        });
        let model = unit_model("a", "m");

        tracker.record_cost(&model, dollars(4), CostContext::new());
        assert!(!tracker.status().warning_triggered);

        tracker.record_cost(&model, dollars(2), CostContext::new());
        let status = tracker.status();
        assert!(status.warning_triggered);
        assert!(!status.stop_triggered);
        assert!((status.percent_used - 0.6).abs() < 1e-12);
        assert!((status.remaining_usd - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_latches_fire_once() {
        let tracker = CostTracker::new(10.0);
        let warnings = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        {
            let warnings = warnings.clone();
            tracker.on_warning(move |_| {
                warnings.fetch_add(1, Ordering::SeqCst);
            });
            let stops = stops.clone();
            tracker.on_stop(move |_| {
                stops.fetch_add(1, Ordering::SeqCst);
            });
        }
        let model = unit_model("a", "m");

        tracker.record_cost(&model, dollars(8), CostContext::new());
        tracker.record_cost(&model, dollars(1), CostContext::new());
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 0);

        tracker.record_cost(&model, dollars(1), CostContext::new());
        tracker.record_cost(&model, dollars(5), CostContext::new());
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(tracker.status().warning_triggered);
    }

    #[test]
    fn test_single_entry_can_fire_both_latches() {
        let tracker = CostTracker::new(10.0);
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired_w = fired.clone();
            tracker.on_warning(move |_| {
                fired_w.fetch_add(1, Ordering::SeqCst);
            });
            let fired_s = fired.clone();
            tracker.on_stop(move |_| {
                fired_s.fetch_add(10, Ordering::SeqCst);
            });
        }

        tracker.record_cost(&unit_model("a", "m"), dollars(12), CostContext::new());

        assert_eq!(fired.load(Ordering::SeqCst), 11);
        let status = tracker.status();
        assert!(status.warning_triggered && status.stop_triggered);
        assert_eq!(status.remaining_usd, 0.0);
        assert!(status.percent_used > 1.0);
    }

    #[test]
    fn test_reset_thresholds_rearms() {
        let tracker = CostTracker::new(10.0);
        let warnings = Arc::new(AtomicUsize::new(0));
        {
            let warnings = warnings.clone();
            tracker.on_warning(move |_| {
                warnings.fetch_add(1, Ordering::SeqCst);
            });
        }
        let model = unit_model("a", "m");

        tracker.record_cost(&model, dollars(8), CostContext::new());
        tracker.reset_thresholds();
        assert!(!tracker.status().warning_triggered);

        tracker.record_cost(&model, TokenUsage::new(1, 0), CostContext::new());
        assert!(tracker.status().warning_triggered);
        assert_eq!(warnings.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_set_budget_limit_clears_latches() {
        let tracker = CostTracker::new(10.0);
        tracker.record_cost(&unit_model("a", "m"), dollars(10), CostContext::new());
        assert!(tracker.status().stop_triggered);

        tracker.set_budget_limit(100.0);
        let status = tracker.status();
        assert!(!status.warning_triggered);
        assert!(!status.stop_triggered);
        assert!((status.percent_used - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_zero_budget_never_fires() {
        let tracker = CostTracker::new(0.0);
        tracker.record_cost(&unit_model("a", "m"), dollars(3), CostContext::new());
        let status = tracker.status();
        assert_eq!(status.percent_used, 0.0);
        assert!(!status.warning_triggered);
    }

    #[test]
    fn test_would_exceed_budget() {
        let tracker = CostTracker::new(10.0);
        let model = unit_model("a", "m");
        tracker.record_cost(&model, dollars(7), CostContext::new());

        let ok = tracker.would_exceed_budget(&model, 2_000_000, 0);
        assert!(!ok.exceeds);
        assert!((ok.projected_total_usd - 9.0).abs() < 1e-12);
        assert!((ok.remaining_usd - 1.0).abs() < 1e-12);

        let over = tracker.would_exceed_budget(&model, 4_000_000, 0);
        assert!(over.exceeds);
        assert_eq!(over.remaining_usd, 0.0);

        // Projections never record anything
        assert_eq!(tracker.status().entry_count, 1);
    }

    #[test]
    fn test_estimate_cost() {
        let tracker = CostTracker::new(10.0);
        let model = Model::new("a", "m").with_pricing(3.0, 15.0);
        assert!((tracker.estimate_cost(&model, 1_000_000, 500_000) - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_groupings_sorted_desc() {
        let tracker = CostTracker::new(100.0);
        tracker.record_cost(&unit_model("openai", "gpt-4o-mini"), dollars(1), CostContext::new());
        tracker.record_cost(&unit_model("anthropic", "claude"), dollars(5), CostContext::new());
        tracker.record_cost(&unit_model("openai", "gpt-4o"), dollars(3), CostContext::new());

        let providers = tracker.by_provider();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].vendor, "anthropic");
        assert_eq!(providers[1].vendor, "openai");
        assert_eq!(providers[1].call_count, 2);
        assert!((providers[1].total_cost_usd - 4.0).abs() < 1e-12);

        let models: Vec<String> = tracker.by_model().into_iter().map(|m| m.model_id).collect();
        assert_eq!(models, vec!["claude", "gpt-4o", "gpt-4o-mini"]);
    }

    #[test]
    fn test_correlation_filters() {
        let tracker = CostTracker::new(100.0);
        let model = unit_model("a", "m");
        tracker.record_cost(
            &model,
            dollars(1),
            CostContext::new().with_task("t1").with_agent("a1").with_swarm("s1"),
        );
        tracker.record_cost(&model, dollars(1), CostContext::new().with_agent("a2"));

        assert_eq!(tracker.for_task("t1").len(), 1);
        assert_eq!(tracker.for_agent("a1").len(), 1);
        assert_eq!(tracker.for_agent("a2").len(), 1);
        assert_eq!(tracker.for_swarm("s1").len(), 1);
        assert!(tracker.for_swarm("s2").is_empty());
    }

    #[test]
    fn test_export_report() {
        let tracker = CostTracker::new(100.0);
        tracker.record_cost(&unit_model("a", "m"), dollars(2), CostContext::new());

        let report = tracker.export_report();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.by_provider.len(), 1);
        assert_eq!(report.status.entry_count, 1);

        let json = tracker.export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"]["entry_count"], 1);
    }

    #[test]
    fn test_clear() {
        let tracker = CostTracker::new(10.0);
        tracker.record_cost(&unit_model("a", "m"), dollars(9), CostContext::new());
        tracker.clear();

        let status = tracker.status();
        assert_eq!(status.entry_count, 0);
        assert_eq!(status.total_cost_usd, 0.0);
        assert!(!status.warning_triggered);
        assert!(tracker.entries().is_empty());
    }

    #[test]
    fn test_clones_share_ledger() {
        let tracker = CostTracker::new(10.0);
        let cloned = tracker.clone();
        cloned.record_cost(&unit_model("a", "m"), dollars(1), CostContext::new());
        assert_eq!(tracker.status().entry_count, 1);
    }

    #[test]
    fn test_cost_tracker_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CostTracker>();
    }
}
