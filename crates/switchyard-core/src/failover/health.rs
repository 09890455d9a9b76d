//! Per-vendor health records and the rolling attempt history

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::types::Attempt;

/// Consecutive failures at which a vendor is marked unhealthy regardless of rate
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Running health statistics for one vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorHealth {
    pub vendor: String,
    pub healthy: bool,
    /// successful / total, 1.0 before any request
    pub success_rate: f64,
    /// Exponential moving average over successful attempts, 0 until the first one
    pub avg_latency_ms: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl VendorHealth {
    /// Fresh record for a vendor with no history
    pub fn new(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            healthy: true,
            success_rate: 1.0,
            avg_latency_ms: 0.0,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            consecutive_failures: 0,
            last_success: None,
            last_failure: None,
        }
    }

    fn record_success(&mut self, latency_ms: u64, alpha: f64) {
        let latency = latency_ms as f64;
        self.avg_latency_ms = if self.successful_requests == 0 {
            latency
        } else {
            alpha * latency + (1.0 - alpha) * self.avg_latency_ms
        };
        self.total_requests += 1;
        self.successful_requests += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(Utc::now());
    }

    fn record_failure(&mut self) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.consecutive_failures += 1;
        self.last_failure = Some(Utc::now());
    }

    fn recompute(&mut self, threshold: f64) {
        if self.total_requests > 0 {
            self.success_rate = self.successful_requests as f64 / self.total_requests as f64;
        }
        self.healthy =
            self.success_rate >= threshold && self.consecutive_failures < MAX_CONSECUTIVE_FAILURES;
    }
}

/// Health records keyed by vendor
///
/// Records are only ever added or reset, never removed. A store can be shared
/// between engines; its threshold and smoothing factor apply to all of them.
#[derive(Debug)]
pub struct HealthStore {
    threshold: f64,
    latency_alpha: f64,
    records: RwLock<Records>,
}

#[derive(Debug, Default)]
struct Records {
    order: Vec<String>,
    by_vendor: HashMap<String, VendorHealth>,
}

impl Records {
    fn insert_missing(&mut self, vendors: &[String]) -> usize {
        let mut added = 0;
        for vendor in vendors {
            if !self.by_vendor.contains_key(vendor) {
                self.by_vendor
                    .insert(vendor.clone(), VendorHealth::new(vendor.clone()));
                self.order.push(vendor.clone());
                added += 1;
            }
        }
        added
    }
}

impl HealthStore {
    /// Create a store tracking `vendors`
    pub fn new(vendors: &[String], threshold: f64, latency_alpha: f64) -> Self {
        let mut records = Records::default();
        records.insert_missing(vendors);
        Self {
            threshold,
            latency_alpha,
            records: RwLock::new(records),
        }
    }

    /// Start tracking any of `vendors` not tracked yet; existing records are kept
    pub fn track(&self, vendors: &[String]) {
        let added = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert_missing(vendors);
        if added > 0 {
            debug!(added, "Tracking additional vendors");
        }
    }

    /// Tracked vendors in the order they were first added
    pub fn vendors(&self) -> Vec<String> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn latency_alpha(&self) -> f64 {
        self.latency_alpha
    }

    /// Apply one attempt outcome; returns the updated record
    ///
    /// Attempts against vendors outside the tracked set are ignored.
    pub fn record(&self, vendor: &str, success: bool, latency_ms: u64) -> Option<VendorHealth> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let Some(health) = records.by_vendor.get_mut(vendor) else {
            warn!(vendor = %vendor, "Attempt recorded for untracked vendor");
            return None;
        };

        let was_healthy = health.healthy;
        if success {
            health.record_success(latency_ms, self.latency_alpha);
        } else {
            health.record_failure();
        }
        health.recompute(self.threshold);

        if was_healthy && !health.healthy {
            warn!(
                vendor = %vendor,
                success_rate = health.success_rate,
                consecutive_failures = health.consecutive_failures,
                "Vendor marked unhealthy"
            );
        } else if !was_healthy && health.healthy {
            info!(vendor = %vendor, success_rate = health.success_rate, "Vendor recovered");
        }

        Some(health.clone())
    }

    /// Snapshot of one vendor
    pub fn get(&self, vendor: &str) -> Option<VendorHealth> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_vendor
            .get(vendor)
            .cloned()
    }

    /// Snapshot of every tracked vendor in tracking order
    pub fn snapshot(&self) -> Vec<VendorHealth> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .order
            .iter()
            .filter_map(|v| records.by_vendor.get(v).cloned())
            .collect()
    }

    /// Return every record to its fresh state
    pub fn reset(&self) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        for (vendor, health) in records.by_vendor.iter_mut() {
            *health = VendorHealth::new(vendor.clone());
        }
    }
}

/// Attempts from the recent past, oldest first
#[derive(Debug)]
pub struct AttemptHistory {
    window: Duration,
    attempts: RwLock<VecDeque<(Instant, Attempt)>>,
}

impl AttemptHistory {
    /// Keep attempts younger than `window`
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            attempts: RwLock::new(VecDeque::new()),
        }
    }

    pub fn push(&self, attempt: Attempt) {
        let mut attempts = self.attempts.write().unwrap_or_else(PoisonError::into_inner);
        attempts.push_back((Instant::now(), attempt));
        prune(&mut attempts, self.window);
    }

    /// Attempts still inside the window
    pub fn snapshot(&self) -> Vec<Attempt> {
        let mut attempts = self.attempts.write().unwrap_or_else(PoisonError::into_inner);
        prune(&mut attempts, self.window);
        attempts.iter().map(|(_, a)| a.clone()).collect()
    }

    pub fn for_vendor(&self, vendor: &str) -> Vec<Attempt> {
        self.snapshot()
            .into_iter()
            .filter(|a| a.vendor == vendor)
            .collect()
    }

    pub fn clear(&self) {
        self.attempts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn prune(attempts: &mut VecDeque<(Instant, Attempt)>, window: Duration) {
    while attempts
        .front()
        .is_some_and(|(at, _)| at.elapsed() > window)
    {
        attempts.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::TransportError;

    fn store() -> HealthStore {
        HealthStore::new(&["a".to_string(), "b".to_string()], 0.5, 0.1)
    }

    #[test]
    fn test_fresh_records_are_healthy() {
        let store = store();
        let a = store.get("a").unwrap();
        assert!(a.healthy);
        assert_eq!(a.success_rate, 1.0);
        assert_eq!(a.total_requests, 0);
        assert_eq!(store.snapshot().len(), 2);
        assert!(store.get("zzz").is_none());
    }

    #[test]
    fn test_three_consecutive_failures_mark_unhealthy() {
        let store = store();
        for _ in 0..10 {
            store.record("a", true, 100);
        }
        store.record("a", false, 0);
        store.record("a", false, 0);
        assert!(store.get("a").unwrap().healthy);

        let a = store.record("a", false, 0).unwrap();
        assert!(!a.healthy);
        assert!(a.success_rate > 0.5);
        assert_eq!(a.consecutive_failures, 3);

        let a = store.record("a", true, 100).unwrap();
        assert!(a.healthy);
        assert_eq!(a.consecutive_failures, 0);
    }

    #[test]
    fn test_low_success_rate_marks_unhealthy() {
        let store = store();
        store.record("b", true, 10);
        store.record("b", false, 0);
        store.record("b", false, 0);
        store.record("b", true, 10);
        store.record("b", false, 0);

        let b = store.get("b").unwrap();
        assert_eq!(b.total_requests, 5);
        assert_eq!(b.successful_requests + b.failed_requests, b.total_requests);
        assert!((b.success_rate - 0.4).abs() < 1e-12);
        assert!(!b.healthy);
    }

    #[test]
    fn test_latency_ema_seeds_then_smooths() {
        let store = store();
        store.record("a", false, 5_000);
        assert_eq!(store.get("a").unwrap().avg_latency_ms, 0.0);

        store.record("a", true, 200);
        assert_eq!(store.get("a").unwrap().avg_latency_ms, 200.0);

        store.record("a", true, 400);
        let ema = store.get("a").unwrap().avg_latency_ms;
        assert!((ema - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let store = store();
        store.record("a", false, 0);
        store.reset();
        assert_eq!(store.get("a").unwrap(), VendorHealth::new("a"));
        assert!(store.record("untracked", true, 1).is_none());
    }

    #[test]
    fn test_track_adds_without_disturbing_existing() {
        let store = store();
        store.record("a", false, 0);
        store.track(&["c".to_string(), "a".to_string()]);

        assert_eq!(store.vendors(), vec!["a", "b", "c"]);
        assert_eq!(store.get("a").unwrap().failed_requests, 1);
        assert_eq!(store.get("c").unwrap(), VendorHealth::new("c"));
        assert!(store.record("c", true, 10).is_some());
    }

    #[test]
    fn test_history_window() {
        let history = AttemptHistory::new(Duration::from_secs(3600));
        history.push(Attempt::succeeded("a", "m", 1));
        history.push(Attempt::failed("b", "m", 1, TransportError::transport("x")));
        assert_eq!(history.snapshot().len(), 2);
        assert_eq!(history.for_vendor("b").len(), 1);

        let expired = AttemptHistory::new(Duration::ZERO);
        expired.push(Attempt::succeeded("a", "m", 1));
        std::thread::sleep(Duration::from_millis(2));
        assert!(expired.snapshot().is_empty());

        history.clear();
        assert!(history.snapshot().is_empty());
    }
}
