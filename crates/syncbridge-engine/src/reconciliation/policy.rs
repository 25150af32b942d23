//! Mismatch classification policies.
//!
//! A policy never hides a mismatch; it only decides whether a detected
//! mismatch counts towards the failure total of a run.

use std::sync::Arc;

use syncbridge_connector::SubjectDetail;

use super::diff::Mismatch;

/// Decides whether a mismatch is a failure.
pub trait MismatchPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// `detail` is `None` when the detail lookup failed.
    fn is_failure(&self, mismatch: &Mismatch, detail: Option<&SubjectDetail>, partition: &str)
        -> bool;
}

/// Every mismatch is a failure, including subjects that moved partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportTransfers;

impl MismatchPolicy for ReportTransfers {
    fn name(&self) -> &str {
        "report-transfers"
    }

    fn is_failure(&self, _: &Mismatch, _: Option<&SubjectDetail>, _: &str) -> bool {
        true
    }
}

/// Mismatches for subjects that now live in another partition are not failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuppressTransfers;

impl MismatchPolicy for SuppressTransfers {
    fn name(&self) -> &str {
        "suppress-transfers"
    }

    fn is_failure(&self, _: &Mismatch, detail: Option<&SubjectDetail>, partition: &str) -> bool {
        !detail.is_some_and(|d| d.has_moved_from(partition))
    }
}

/// A named reconciliation and the policy it applies.
#[derive(Clone)]
pub struct ReconciliationKind {
    name: String,
    policy: Arc<dyn MismatchPolicy>,
}

impl ReconciliationKind {
    pub fn new(name: impl Into<String>, policy: Arc<dyn MismatchPolicy>) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    /// Allocation counts: a mismatch is a sync problem even after a transfer.
    #[must_use]
    pub fn allocation() -> Self {
        Self::new("activity-allocation", Arc::new(ReportTransfers))
    }

    /// Attendance counts: transfers race with the count and are suppressed.
    #[must_use]
    pub fn attendance() -> Self {
        Self::new("activity-attendance", Arc::new(SuppressTransfers))
    }

    /// Prefix of every telemetry event emitted for this reconciliation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn policy(&self) -> &dyn MismatchPolicy {
        self.policy.as_ref()
    }
}

impl std::fmt::Debug for ReconciliationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationKind")
            .field("name", &self.name)
            .field("policy", &self.policy.name())
            .finish()
    }
}
