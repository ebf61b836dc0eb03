//! Append-only journal format for Canopy commit batches.
//!
//! This crate provides:
//! - Framed, checksummed, append-only storage for commit batches
//! - Reader/writer APIs with strict and permissive modes
//! - Verification of commit framing and journal ordering
//!
//! Each workspace keeps one journal file. Every frame holds one complete
//! commit (its change events followed by PERSIST), so a torn write can only
//! ever lose the last commit, never expose part of it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canopy_core::{ChangeRecord, CommitBatch, Event, EventType, ItemPath, Timestamp};
//! use canopy_journal::{JournalReader, JournalWriter, ReadMode, WriteOptions};
//!
//! let ts = Timestamp::now();
//! let added = ChangeRecord::new(EventType::NodeAdded, ItemPath::parse("/a")?);
//! let batch = CommitBatch {
//!     sequence: 1,
//!     workspace: "default".to_string(),
//!     timestamp: ts,
//!     events: vec![added.into_event(ts, "admin", None), Event::persist(ts, "admin", None)],
//! };
//!
//! let mut writer = JournalWriter::open("default.cnj", WriteOptions::default())?;
//! writer.append_batch(&batch)?;
//! writer.finish()?;
//!
//! let mut reader = JournalReader::open("default.cnj", ReadMode::Strict)?;
//! while let Some(batch) = reader.read_batch()? {
//!     println!("commit {}: {} events", batch.sequence, batch.events.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Key Types
//!
//! - [`JournalWriter`] - Append commit batches
//! - [`JournalReader`] - Replay commit batches
//! - [`verify_batch`] - Check a batch against its predecessor

#![deny(missing_docs)]

/// Error types for journal operations.
pub mod errors;
/// Frame structure and serialization.
pub mod frame;
/// Journal reader implementation.
pub mod reader;
/// Commit batch payload encoding.
pub mod record;
/// Verification helpers for journal batches.
pub mod verification;
/// Journal writer implementation.
pub mod writer;

pub use errors::JournalError;
pub use frame::{FrameKind, JournalHeader, RecordFrame};
pub use reader::{JournalReader, ReadMode};
pub use record::{decode_batch, encode_batch};
pub use verification::verify_batch;
pub use writer::{JournalWriter, WriteOptions};
