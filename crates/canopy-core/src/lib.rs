//! Observation event model for Canopy content repositories.
//!
//! This crate provides:
//! - [`Event`] and [`EventType`] with JCR-compatible type bits
//! - [`EventTypeMask`] for type filtering
//! - [`ItemPath`] absolute item paths with subtree checks
//! - Identifiers ([`NodeId`], [`NodeTypeName`], [`WorkspaceName`]) and [`Timestamp`]
//! - [`CommitBatch`] framing and its PERSIST invariants
//!
//! Core invariants:
//! - Events are immutable once stamped with their commit timestamp
//! - Every commit is a run of change events closed by exactly one PERSIST
//! - All events of one commit share the commit timestamp
//!
#![deny(missing_docs)]

/// Error types for core operations.
pub mod errors;
/// Event types, masks, events and commit batches.
pub mod event;
/// Identifiers and timestamps.
pub mod identifiers;
/// Absolute item paths.
pub mod path;
/// Validation errors for paths and names.
pub mod validation;

pub use errors::CoreError;
pub use event::{
    validate_batch, ChangeRecord, CommitBatch, Event, EventType, EventTypeMask,
    INFO_DEST_ABS_PATH, INFO_SRC_ABS_PATH,
};
pub use identifiers::{NodeId, NodeTypeName, Timestamp, WorkspaceName};
pub use path::{validate_name, ItemPath};
pub use validation::ValidationError;
