use thiserror::Error;

/// Core error types.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A path, name or identifier failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] crate::validation::ValidationError),
    /// A commit batch breaks the PERSIST framing rules.
    #[error("invalid commit batch: {0}")]
    InvalidBatch(String),
    /// Event type name or bit could not be resolved.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
    /// Timestamp could not be parsed.
    #[error("invalid timestamp '{0}': expected milliseconds or RFC 3339")]
    InvalidTimestamp(String),
}
