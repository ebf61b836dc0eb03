use thiserror::Error;

/// Validation errors for paths, names and identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// When a value does not match the required pattern.
    #[error("{field} ('{value}') is not allowed")]
    PatternMismatch {
        /// Field name that failed validation.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// When a path is not a well-formed absolute path.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// Offending path.
        path: String,
        /// Why the path was rejected.
        reason: &'static str,
    },
}
