//! # Event-driven synchronization
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌──────────────┐
//! │  Transport   │────►│  SyncOrchestrator  │────►│ TargetClient │
//! │ (redelivery) │     │                    │     └──────────────┘
//! └──────┬───────┘     └─────────┬──────────┘
//!        │                       │ mapping write failed
//!        │                       ▼
//!        │             ┌────────────────────┐     ┌────────────────────┐
//!        │             │  RetryCoordinator  │────►│ MappingStoreClient │
//!        │             └─────────┬──────────┘     └────────────────────┘
//!        │                       │ N failures
//!        ▼                       ▼
//! ┌──────────────────────────────────────────┐
//! │              Dead Letter Queue           │◄──── replay
//! └──────────────────────────────────────────┘
//! ```

pub mod dead_letter;
pub mod orchestrator;
pub mod retry;
pub mod strategy;
pub mod transport;
pub mod worker;

pub use dead_letter::{
    AttemptRecord, DeadLetter, DeadLetterPayload, DeadLetterQueue, InMemoryDeadLetterQueue,
};
#[cfg(feature = "postgres")]
pub use dead_letter::PgDeadLetterQueue;
pub use orchestrator::{SyncOrchestrator, SyncOutcome};
pub use retry::{
    MappingRetryQueue, RetryContext, RetryCoordinator, RetryOutcome, RetryPolicy, RetryState,
};
pub use strategy::{
    DuplicatePolicy, EntitySyncStrategy, FamilyStrategy, FamilyStrategyBuilder, StrategyRegistry,
    SyncAction,
};
pub use transport::{DeliveryOutcome, RedeliveringTransport};
pub use worker::{RetryWorker, RetryWorkerConfig, RetryWorkerHandle};
