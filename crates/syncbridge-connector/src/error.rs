//! Client error types
//!
//! Error definitions with transient/permanent classification for redelivery and retry.

use thiserror::Error;

use crate::types::EntityMapping;

/// Broad failure class used to pick between redelivery, bounded retry and dead-lettering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Record or mapping absent.
    NotFound,
    /// Identifier already claimed by another mapping.
    Conflict,
    /// 5xx, throttling or network level failure.
    Transient,
    /// Rejected request or unmappable data.
    Permanent,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Transient => write!(f, "transient"),
            Self::Permanent => write!(f, "permanent"),
        }
    }
}

/// Error that can occur while talking to the source, target or mapping systems.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Requested record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Mapping store refused a mapping because one already exists.
    #[error("mapping conflict: existing {existing}, duplicate {duplicate}")]
    MappingConflict {
        existing: Box<EntityMapping>,
        duplicate: Box<EntityMapping>,
    },

    /// Remote system failed on its side (5xx or throttled).
    #[error("server error ({status}): {detail}")]
    Server { status: u16, detail: String },

    /// Remote system rejected the request (4xx other than 404/409).
    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// Request did not complete within the configured timeout.
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// Connection could not be established or was dropped.
    #[error("network error: {message}")]
    Network { message: String },

    /// Response body could not be decoded.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Required configuration variable is missing.
    #[error("configuration missing: {var}")]
    ConfigMissing { var: String },

    /// Configuration value is invalid.
    #[error("configuration invalid for {var}: {reason}")]
    ConfigInvalid { var: String, reason: String },
}

impl ConnectorError {
    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a mapping conflict error.
    #[must_use]
    pub fn mapping_conflict(existing: EntityMapping, duplicate: EntityMapping) -> Self {
        Self::MappingConflict {
            existing: Box::new(existing),
            duplicate: Box::new(duplicate),
        }
    }

    /// Create a server-side error.
    pub fn server(status: u16, detail: impl Into<String>) -> Self {
        Self::Server {
            status,
            detail: detail.into(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MappingConflict { .. } => ErrorKind::Conflict,
            Self::Server { .. } | Self::Timeout { .. } | Self::Network { .. } => {
                ErrorKind::Transient
            }
            Self::Rejected { .. }
            | Self::Parse(_)
            | Self::ConfigMissing { .. }
            | Self::ConfigInvalid { .. } => ErrorKind::Permanent,
        }
    }

    /// Returns true if the failure may succeed on a later attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Returns true if this is a duplicate-mapping conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Returns true if the record was not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                message: error.to_string(),
            }
        } else if error.is_decode() {
            Self::Parse(error.to_string())
        } else {
            Self::network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

/// Result type for client operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
