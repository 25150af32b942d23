//! Run statistics tracking for reconciliation.
//!
//! Tracks and aggregates statistics during a report run. Keys within a page
//! are checked concurrently, so the tracker uses atomics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use super::diff::MismatchKind;

/// Statistics for a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Total keys in scope, from the initial population count.
    #[serde(default)]
    pub keys_total: u64,
    /// Keys whose counts were fetched on both sides.
    #[serde(default)]
    pub keys_checked: u64,
    /// Mismatches detected, including suppressed ones.
    #[serde(default)]
    pub mismatches_found: u32,
    /// Mismatches broken down by kind.
    #[serde(default)]
    pub mismatches_by_kind: HashMap<String, u32>,
    /// Mismatches that count as failures.
    #[serde(default)]
    pub failures: u32,
    /// Mismatches excluded from failures by policy.
    #[serde(default)]
    pub suppressed: u32,
    /// Pages that could not be fetched.
    #[serde(default)]
    pub page_errors: u32,
    /// Keys whose comparison failed.
    #[serde(default)]
    pub key_errors: u32,
    /// Total duration in seconds.
    #[serde(default)]
    pub duration_seconds: u64,
}

impl RunStatistics {
    /// Get count for a specific mismatch kind.
    #[must_use]
    pub fn mismatch_count(&self, kind: MismatchKind) -> u32 {
        self.mismatches_by_kind
            .get(&kind.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Whether any page or key could not be checked.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.page_errors > 0 || self.key_errors > 0
    }
}

/// Thread-safe tracker for accumulating statistics during a run.
pub struct StatisticsTracker {
    keys_total: AtomicU64,
    keys_checked: AtomicU64,
    mismatches_found: AtomicU32,
    mismatches_by_kind: RwLock<HashMap<MismatchKind, u32>>,
    failures: AtomicU32,
    suppressed: AtomicU32,
    page_errors: AtomicU32,
    key_errors: AtomicU32,
    start_time: Instant,
}

impl StatisticsTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keys_total: AtomicU64::new(0),
            keys_checked: AtomicU64::new(0),
            mismatches_found: AtomicU32::new(0),
            mismatches_by_kind: RwLock::new(HashMap::new()),
            failures: AtomicU32::new(0),
            suppressed: AtomicU32::new(0),
            page_errors: AtomicU32::new(0),
            key_errors: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn set_total(&self, total: u64) {
        self.keys_total.store(total, Ordering::SeqCst);
    }

    pub fn increment_checked(&self, count: u64) {
        self.keys_checked.fetch_add(count, Ordering::SeqCst);
    }

    /// Record a detected mismatch and whether it counts as a failure.
    pub fn record_mismatch(&self, kind: MismatchKind, is_failure: bool) {
        self.mismatches_found.fetch_add(1, Ordering::SeqCst);
        if is_failure {
            self.failures.fetch_add(1, Ordering::SeqCst);
        } else {
            self.suppressed.fetch_add(1, Ordering::SeqCst);
        }
        if let Ok(mut map) = self.mismatches_by_kind.write() {
            *map.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn record_page_error(&self) {
        self.page_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_key_error(&self) {
        self.key_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total_count(&self) -> u64 {
        self.keys_total.load(Ordering::SeqCst)
    }

    /// Get elapsed duration in seconds.
    pub fn elapsed_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Snapshot current statistics.
    pub fn snapshot(&self) -> RunStatistics {
        let mismatches_by_kind = self
            .mismatches_by_kind
            .read()
            .map(|map| map.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .unwrap_or_default();

        RunStatistics {
            keys_total: self.keys_total.load(Ordering::SeqCst),
            keys_checked: self.keys_checked.load(Ordering::SeqCst),
            mismatches_found: self.mismatches_found.load(Ordering::SeqCst),
            mismatches_by_kind,
            failures: self.failures.load(Ordering::SeqCst),
            suppressed: self.suppressed.load(Ordering::SeqCst),
            page_errors: self.page_errors.load(Ordering::SeqCst),
            key_errors: self.key_errors.load(Ordering::SeqCst),
            duration_seconds: self.elapsed_seconds(),
        }
    }
}

impl Default for StatisticsTracker {
    fn default() -> Self {
        Self::new()
    }
}
