//! Error types for the syncbridge-events crate.

use thiserror::Error;

/// Errors raised while turning an inbound message into a change event.
#[derive(Debug, Error)]
pub enum EventError {
    /// Message body is not a valid envelope.
    #[error("Invalid event envelope: {reason}")]
    InvalidEnvelope { reason: String },

    /// Envelope lacks the attribute that identifies the entity.
    #[error("Event {event_type} is missing attribute {attribute}")]
    MissingAttribute {
        event_type: String,
        attribute: String,
    },
}

impl EventError {
    /// Malformed input never becomes valid on redelivery.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        false
    }
}

impl From<serde_json::Error> for EventError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidEnvelope {
            reason: error.to_string(),
        }
    }
}

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;
