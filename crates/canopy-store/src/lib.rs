//! Event journal storage for Canopy workspaces.
//!
//! This crate provides:
//! - `EventSource` and `EventStore` traits for append-only, time-ordered event storage
//! - An in-memory store and a durable store backed by `canopy-journal` files
//! - Event filtering API (type mask, path/subtree, identifiers, node types)
//! - `EventJournal`, a lazy cursor with skip-to-timestamp resumption
//! - Commit-level views for tooling
//!
//! Stores accept whole commits only: change events followed by one PERSIST
//! marker, all sharing the commit timestamp. Readers see a commit entirely
//! or not at all.

#![deny(missing_docs)]

/// Lazy cursor over filtered events.
pub mod cursor;
/// Journal-backed storage implementation.
pub mod durable;
/// Error types for store operations.
pub mod error;
/// Event filtering API.
pub mod filter;
/// In-memory storage implementation.
pub mod memory;
/// Storage backend traits.
pub mod traits;
/// Commit-level views.
pub mod view;

pub use canopy_journal::{ReadMode, WriteOptions};
pub use cursor::{EventJournal, Events, DEFAULT_PAGE_SIZE};
pub use durable::{load_journal, DurableOptions, DurableStore, LoadedJournal};
pub use error::StoreError;
pub use filter::{
    AndFilter, EventFilter, EventTypeFilter, IdentifierFilter, JournalFilter, NodeTypeFilter,
    OrFilter, PathFilter, TimeRangeFilter, UserFilter,
};
pub use memory::MemoryStore;
pub use traits::{CommitReceipt, EventSource, EventStore};
pub use view::{commits, next_commit, CommitView};
