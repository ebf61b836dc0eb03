//! CLI error type.

use canopy_journal::JournalError;
use canopy_store::StoreError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// The journal path was rejected.
    #[error("Invalid journal path: {0}")]
    InvalidPath(String),
    /// A command-line argument could not be parsed.
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    /// The journal could not be opened or read.
    #[error("Failed to read journal {path}: {source}")]
    Journal {
        path: String,
        #[source]
        source: JournalError,
    },
    /// The journal could not be replayed.
    #[error("Failed to load journal {path}: {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },
    /// Verification found invalid batches.
    #[error("{0} batch(es) failed verification")]
    VerificationFailed(usize),
    /// Output could not be serialized.
    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn argument(name: &'static str, err: impl std::fmt::Display) -> Self {
        CliError::InvalidArgument {
            name,
            reason: err.to_string(),
        }
    }
}
