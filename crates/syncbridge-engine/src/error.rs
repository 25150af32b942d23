//! Engine error types
//!
//! Errors are classified so the transport can tell redelivery from dead-lettering.

use thiserror::Error;
use uuid::Uuid;

use syncbridge_connector::{ConnectorError, EntityMapping, ErrorKind};
use syncbridge_events::EventError;

/// Errors that can occur while synchronizing a change event.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No strategy handles this event type.
    #[error("no strategy registered for event type {event_type}")]
    UnknownEventType { event_type: String },

    /// Source data cannot be expressed in the target system.
    #[error("validation failed for {family}: {message}")]
    Validation { family: String, message: String },

    /// Mapping store reported a duplicate and the family rejects duplicates.
    #[error("duplicate mapping: existing {existing}, duplicate {duplicate}")]
    DuplicateMapping {
        existing: Box<EntityMapping>,
        duplicate: Box<EntityMapping>,
    },

    /// Source, target or mapping store call failed.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Inbound message could not be turned into a change event.
    #[error(transparent)]
    Event(#[from] EventError),

    /// Dead-letter storage failed.
    #[error("dead letter queue error: {0}")]
    DeadLetter(String),

    /// Requested dead-letter entry does not exist or has the wrong kind.
    #[error("dead letter {id} not found")]
    DeadLetterNotFound { id: Uuid },

    /// Background retry worker has shut down.
    #[error("retry worker is not running")]
    WorkerUnavailable,

    /// Configuration value is invalid.
    #[error("configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },

    /// JSON serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database operation failed.
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SyncError {
    /// Create a validation error.
    pub fn validation(family: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            family: family.into(),
            message: message.into(),
        }
    }

    /// Whether redelivering the same event may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connector(e) => e.is_transient(),
            Self::DeadLetter(_) | Self::WorkerUnavailable => true,
            #[cfg(feature = "postgres")]
            Self::Database(_) => true,
            _ => false,
        }
    }

    /// Whether this is a duplicate-mapping rejection.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateMapping { .. })
            || matches!(self, Self::Connector(e) if e.is_conflict())
    }

    /// Outcome segment used for the terminal `{family}-{action}-{outcome}` event.
    #[must_use]
    pub fn telemetry_outcome(&self) -> &'static str {
        if self.is_duplicate() {
            return "duplicate";
        }
        match self {
            Self::Connector(e) if e.kind() == ErrorKind::NotFound => "not-found",
            _ => "failed",
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
