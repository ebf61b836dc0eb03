//! Observation for Canopy workspaces.
//!
//! This crate ties the event store to a reference content tree:
//! - `Repository`, `Workspace` and `Session` with pending changes and `save`
//! - A change recorder that turns every committed mutation into events,
//!   closed by one PERSIST marker per commit
//! - `ObservationManager` for filtered event journals and live listeners
//!
//! ```
//! use canopy_observation::{JournalQuery, Repository, RepositoryConfig};
//! use canopy_core::EventType;
//!
//! let repo = Repository::open(RepositoryConfig::in_memory())?;
//! let mut session = repo.login("admin", "default")?;
//! session.add_node("/child", None)?;
//! session.save()?;
//!
//! let manager = session.observation_manager();
//! let mut journal = manager.get_event_journal(JournalQuery::new().event_types(EventType::NodeAdded))?;
//! let paths: Vec<String> = journal.events().map(|e| e.path().to_string()).collect();
//! assert_eq!(paths, vec!["/child"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

/// Commit timestamp sources.
pub mod clock;
/// Repository configuration.
pub mod config;
/// Listener registry and delivery.
pub mod dispatch;
/// Error types.
pub mod error;
/// Observation API of a session.
pub mod manager;
/// Change recording.
pub mod recorder;
/// Workspaces and storage wiring.
pub mod repository;
/// Sessions.
pub mod session;
/// Reference content tree.
pub mod tree;
/// Per-workspace shared state.
pub mod workspace;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RepositoryConfig;
pub use dispatch::{
    DispatchReport, EventBatch, EventListener, ListenerError, ListenerHandle, ListenerId,
    ObservationRegistry,
};
pub use error::RepositoryError;
pub use manager::{JournalQuery, ListenerOptions, ObservationManager};
pub use recorder::{ChangeRecorder, ChangeSink};
pub use repository::{Repository, JOURNAL_EXTENSION};
pub use session::{Session, SessionId};
pub use tree::{NodeView, PropertyValue, Tree, TreeOp};
pub use workspace::{CommitOutcome, Workspace};
