//! # Reconciliation
//!
//! Batch audit comparing per-key counts held by the source and target
//! systems, independent of the event stream.
//!
//! ```text
//! ┌───────────────────────┐  trigger   ┌───────────────────────┐
//! │ ReconciliationScheduler├──────────►│ ReconciliationTrigger │
//! └───────────────────────┘            └───────────┬───────────┘
//!                                                  │ spawn
//!                                                  ▼
//!  PopulationClient ──►┌───────────────────────┐◄── CountClient (source)
//!                      │ ReconciliationRunner  │◄── CountClient (target)
//!  DetailClient ──────►└───────────┬───────────┘
//!                                  │ diff + MismatchPolicy
//!                                  ▼
//!                       ReconciliationSummary ──► TelemetrySink
//! ```

pub mod diff;
pub mod policy;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod statistics;
pub mod trigger;

pub use diff::{diff, sorted, Mismatch, MismatchKind};
pub use policy::{MismatchPolicy, ReconciliationKind, ReportTransfers, SuppressTransfers};
pub use report::{ReconciliationSummary, ReportedMismatch};
pub use runner::{
    ReconciliationClients, ReconciliationConfig, ReconciliationError, ReconciliationResult,
    ReconciliationRunner, ReconciliationScope,
};
pub use scheduler::{ReconciliationScheduler, ScheduleConfig, ScheduleFrequency};
pub use statistics::{RunStatistics, StatisticsTracker};
pub use trigger::{ReconciliationTrigger, TriggerAccepted};
