//! Error type for journal files.

use thiserror::Error;

/// Errors raised while reading or writing a workspace journal.
#[derive(Error, Debug)]
pub enum JournalError {
    /// Underlying file error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Header magic, version or flags are wrong.
    #[error("invalid journal header: {0}")]
    InvalidHeader(String),
    /// Frame header or checksum is wrong.
    #[error("invalid frame at offset {offset}: {reason}")]
    InvalidFrame {
        /// Offset of the frame header.
        offset: u64,
        /// What is wrong with it.
        reason: String,
    },
    /// Batch payload is larger than a frame may carry.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// Payload size in bytes.
        size: u32,
        /// Frame payload limit.
        max: u32,
    },
    /// Invalid UTF-8 in a batch payload.
    #[error("invalid UTF-8 in batch payload: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// Batch payload is not valid JSON for a commit batch.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    /// File is too short for a header but not empty.
    #[error("file has partial header; refusing to initialize")]
    FileNotEmpty,
    /// Frame cut short by a torn write (strict mode).
    #[error("truncated frame at offset {offset}")]
    TruncatedFrame {
        /// Offset of the torn frame.
        offset: u64,
    },
    /// A batch breaks the commit framing rules or the journal ordering.
    #[error("invalid batch {sequence}: {reason}")]
    InvalidBatch {
        /// Sequence number of the offending batch.
        sequence: u64,
        /// What is wrong with it.
        reason: String,
    },
}
