//! Error types for the engagement-ai library.
//!
//! Every caller-facing operation resolves to either a typed success value or an
//! [`EngagementError`]. Callers that only need to decide what to show a user
//! should match on [`EngagementError::kind`] instead of the variant itself.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the language model or the test webhook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The call did not answer before the hard timeout
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),

    /// The remote side answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        body: String,
    },

    /// Connection, DNS or body-read failure
    #[error("network error: {0}")]
    Network(String),
}

/// Errors that can occur in the engagement-ai application.
#[derive(Error, Debug)]
pub enum EngagementError {
    /// A referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Collection name of the missing record
        entity: &'static str,
        /// Identifier that failed to resolve
        id: String,
    },

    /// The model or webhook could not be reached
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The model answered, but not in the expected shape
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),

    /// Caller-supplied input was rejected before any network call
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Record store failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// File I/O errors
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error classification used by callers and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unit, phase, comment or other record id did not resolve
    NotFound,
    /// "AI unreachable": network, non-2xx, timeout or cancellation
    TransportFailure,
    /// "AI gave an invalid answer"
    MalformedModelOutput,
    /// Missing or invalid caller input
    ValidationError,
    /// Record store failure
    Storage,
    /// Startup configuration problem
    Configuration,
}

impl ErrorKind {
    /// Stable label for logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::TransportFailure => "transport_failure",
            Self::MalformedModelOutput => "malformed_model_output",
            Self::ValidationError => "validation_error",
            Self::Storage => "storage",
            Self::Configuration => "configuration",
        }
    }
}

impl EngagementError {
    /// Shorthand for [`EngagementError::NotFound`]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    /// Shorthand for [`EngagementError::Validation`]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`EngagementError::MalformedModelOutput`]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedModelOutput(message.into())
    }

    /// Map this error onto the caller-facing taxonomy
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transport(_) | Self::Cancelled => ErrorKind::TransportFailure,
            Self::MalformedModelOutput(_) => ErrorKind::MalformedModelOutput,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Storage,
            Self::InvalidConfig(_) => ErrorKind::Configuration,
        }
    }
}

/// Convenience type alias for Result with EngagementError
pub type Result<T> = std::result::Result<T, EngagementError>;

impl From<rusqlite::Error> for EngagementError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for EngagementError {
    fn from(err: r2d2::Error) -> Self {
        Self::Storage(format!("connection pool: {err}"))
    }
}

impl From<csv::Error> for EngagementError {
    fn from(err: csv::Error) -> Self {
        Self::Storage(format!("csv: {err}"))
    }
}

impl From<config::ConfigError> for EngagementError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<serde_yaml::Error> for EngagementError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::InvalidConfig(format!("fixture: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_malformed_are_distinct_kinds() {
        let timeout = EngagementError::from(TransportError::TimedOut(Duration::from_secs(8)));
        let malformed = EngagementError::malformed("missing field `confidence`");

        assert_eq!(timeout.kind(), ErrorKind::TransportFailure);
        assert_eq!(malformed.kind(), ErrorKind::MalformedModelOutput);
        assert_ne!(timeout.kind(), malformed.kind());
    }

    #[test]
    fn cancellation_counts_as_transport_failure() {
        assert_eq!(EngagementError::Cancelled.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn not_found_message_names_the_entity() {
        let err = EngagementError::not_found("unit", "does-not-exist");
        assert_eq!(err.to_string(), "unit not found: does-not-exist");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
