//! Error types for store operations.

use canopy_core::Timestamp;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Journal backend error.
    #[error("journal error: {0}")]
    Journal(#[from] canopy_journal::JournalError),
    /// A batch broke the commit framing rules.
    #[error(transparent)]
    Core(#[from] canopy_core::CoreError),
    /// Cursor accessed while not positioned on an event.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
    /// A batch timestamp precedes the last appended one.
    #[error("commit timestamp {attempted} precedes last appended timestamp {last}")]
    NonMonotonicTimestamp {
        /// Last appended timestamp.
        last: Timestamp,
        /// Timestamp of the rejected batch.
        attempted: Timestamp,
    },
    /// A frame before the end of the journal is corrupt. Cutting the file
    /// there would lose the data behind it, so it is refused.
    #[error("journal damaged at offset {offset} ({trailing} bytes follow): {reason}")]
    DamagedJournal {
        /// Offset of the first damaged frame.
        offset: u64,
        /// Bytes from the damaged frame to the end of the file.
        trailing: u64,
        /// What the reader found.
        reason: String,
    },
    /// A replayed batch does not follow its predecessor.
    #[error("expected commit {expected}, found {found}")]
    SequenceGap {
        /// Sequence number the store expected next.
        expected: u64,
        /// Sequence number actually found.
        found: u64,
    },
}
