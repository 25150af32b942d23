//! # Syncbridge Connector
//!
//! Leaf clients for the systems the sync engine talks to.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   fetch    ┌──────────────────┐   create/update/delete   ┌──────────────┐
//! │ SourceClient │◄───────────│  Orchestrator /  │─────────────────────────►│ TargetClient │
//! └──────────────┘            │  Batch Runner    │                          └──────────────┘
//!                             └────────┬─────────┘
//!                                      │ find/create/batch
//!                                      ▼
//!                          ┌──────────────────────┐
//!                          │ MappingStoreClient   │──► HTTP mapping API
//!                          └──────────────────────┘
//! ```
//!
//! Reconciliation uses the narrower [`CountClient`], [`PopulationClient`] and
//! [`DetailClient`] capabilities so a system only implements what it serves.

pub mod config;
pub mod error;
pub mod http;
pub mod traits;
pub mod types;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ConnectorError, ConnectorResult, ErrorKind};
pub use http::HttpMappingStoreClient;
pub use traits::{
    CountClient, DetailClient, MappingStoreClient, PopulationClient, SourceClient, TargetClient,
};
pub use types::{
    ChildMappingBatch, ComparisonKey, CountRecord, EntityMapping, MappingType, SubjectDetail,
};
