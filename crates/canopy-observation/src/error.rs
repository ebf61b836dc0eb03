//! Error types for repository operations.

use canopy_core::{CoreError, ValidationError};
use canopy_store::StoreError;
use thiserror::Error;

/// Errors returned by repositories, workspaces and sessions.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The event store rejected or failed to persist a commit.
    #[error("event store error: {0}")]
    Store(#[from] StoreError),
    /// Event model error.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// A path, name or type failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// No item exists at the given path.
    #[error("path not found: {0}")]
    PathNotFound(String),
    /// An item already exists at the given path.
    #[error("item exists: {0}")]
    ItemExists(String),
    /// The operation is not allowed on the target item.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    /// No workspace with that name.
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),
    /// A workspace with that name already exists.
    #[error("workspace already exists: {0}")]
    WorkspaceExists(String),
    /// The session has been logged out.
    #[error("session is closed")]
    SessionClosed,
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
    /// I/O error while preparing storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
