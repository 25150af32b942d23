//! # Syncbridge Engine
//!
//! Keeps a legacy target system consistent with a source system of record.
//!
//! ## Architecture
//!
//! ```text
//!  change event ──► RedeliveringTransport ──► SyncOrchestrator ──► TargetClient
//!                          │                        │
//!                          │                        ├──► MappingStoreClient
//!                          │                        │
//!                          │                        ▼ mapping write failed
//!                          │                  RetryCoordinator / RetryWorker
//!                          ▼                        │
//!                   DeadLetterQueue ◄───────────────┘
//!
//!  scheduler / trigger ──► ReconciliationRunner ──► diff ──► TelemetrySink
//! ```
//!
//! ## Guarantees
//!
//! - Creation is idempotent: an existing mapping short-circuits the target write.
//! - A target record is written at most once per event; only the mapping write
//!   is retried, with bounded attempts before dead-lettering.
//! - Mapping conflicts are reported as duplicates and never retried.
//! - Reconciliation runs tolerate page and key failures and always publish a
//!   summary once the population size is known.
//!
//! ## Feature flags
//!
//! - `postgres` (default): `PgDeadLetterQueue` backed by sqlx.

pub mod config;
pub mod error;
pub mod logging;
pub mod reconciliation;
pub mod sync;

pub use config::{SyncConfig, SyncConfigBuilder};
pub use error::{SyncError, SyncResult};
pub use reconciliation::{
    diff, Mismatch, MismatchKind, MismatchPolicy, ReconciliationClients, ReconciliationConfig,
    ReconciliationError, ReconciliationKind, ReconciliationResult, ReconciliationRunner,
    ReconciliationScheduler, ReconciliationScope, ReconciliationSummary, ReconciliationTrigger,
    ReportTransfers, ReportedMismatch, RunStatistics, ScheduleConfig, ScheduleFrequency,
    StatisticsTracker, SuppressTransfers, TriggerAccepted,
};
pub use sync::{
    DeadLetter, DeadLetterPayload, DeadLetterQueue, DeliveryOutcome, DuplicatePolicy,
    EntitySyncStrategy, FamilyStrategy, InMemoryDeadLetterQueue, MappingRetryQueue,
    RedeliveringTransport, RetryContext, RetryCoordinator, RetryOutcome, RetryPolicy, RetryState,
    RetryWorker, RetryWorkerConfig, RetryWorkerHandle, StrategyRegistry, SyncAction,
    SyncOrchestrator, SyncOutcome,
};
#[cfg(feature = "postgres")]
pub use sync::PgDeadLetterQueue;
