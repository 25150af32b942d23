//! Reconciliation report output.
//!
//! A run produces one [`ReconciliationSummary`]. It is returned to the caller
//! and published as flat telemetry: one event per mismatch plus one summary
//! event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use syncbridge_events::TelemetryEvent;

use super::diff::Mismatch;
use super::runner::ReconciliationScope;
use super::statistics::RunStatistics;

/// A mismatch found in one partition, with its policy classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedMismatch {
    pub partition: String,
    pub mismatch: Mismatch,
    /// `false` when the policy suppressed the failure classification.
    pub is_failure: bool,
}

impl ReportedMismatch {
    /// Telemetry event `{reconciliation}-reconciliation-mismatch`.
    #[must_use]
    pub fn telemetry_event(&self, reconciliation: &str) -> TelemetryEvent {
        TelemetryEvent::new(format!("{reconciliation}-reconciliation-mismatch"))
            .with("key", self.mismatch.key)
            .with("kind", self.mismatch.kind)
            .with_opt("sourceCount", self.mismatch.source_count)
            .with_opt("targetCount", self.mismatch.target_count)
            .with("partition", &self.partition)
            .with("suppressed", !self.is_failure)
            .with_attributes(&self.mismatch.context)
    }
}

/// Final result of a reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub run_id: Uuid,
    pub reconciliation: String,
    pub scope: ReconciliationScope,
    pub partitions: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub statistics: RunStatistics,
    /// Ascending by partition, then key.
    pub mismatches: Vec<ReportedMismatch>,
}

impl ReconciliationSummary {
    #[must_use]
    pub fn mismatch_count(&self) -> usize {
        self.mismatches.len()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.mismatches.iter().filter(|m| m.is_failure).count()
    }

    /// No failures and every page and key was checked.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0 && !self.statistics.has_errors()
    }

    /// Telemetry event `{reconciliation}-reconciliation-report`.
    #[must_use]
    pub fn telemetry_event(&self) -> TelemetryEvent {
        TelemetryEvent::new(format!("{}-reconciliation-report", self.reconciliation))
            .with("runId", self.run_id)
            .with("scope", &self.scope)
            .with("partitions", self.partitions.join(","))
            .with("mismatchCount", self.mismatch_count())
            .with("failureCount", self.failure_count())
            .with("suppressedCount", self.statistics.suppressed)
            .with("keysTotal", self.statistics.keys_total)
            .with("keysChecked", self.statistics.keys_checked)
            .with("pageErrors", self.statistics.page_errors)
            .with("keyErrors", self.statistics.key_errors)
            .with("durationSeconds", self.statistics.duration_seconds)
    }
}
