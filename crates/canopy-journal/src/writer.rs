//! Journal writer implementation.

use crate::errors::JournalError;
use crate::frame::{FrameKind, JournalHeader, RecordFrame};
use crate::record::encode_batch;
use canopy_core::CommitBatch;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

/// Options for journal writing.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Whether to fsync after each append (default: false).
    pub sync: bool,
    /// Whether to create the file if it doesn't exist (default: true).
    pub create: bool,
    /// Whether to append to an existing file (default: true).
    pub append: bool,
    /// Whether a torn header left by a crash during creation is rewritten
    /// (default: false). Only a prefix of a valid header counts as torn.
    pub repair_header: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sync: false,
            create: true,
            append: true,
            repair_header: false,
        }
    }
}

/// Journal writer for append-only commit storage.
///
/// Every commit batch is written as a single `CommitBatch` frame, so a crash
/// mid-write leaves at most one damaged frame at the tail of the file.
///
/// # Example
///
/// ```rust,no_run
/// use canopy_core::{CommitBatch, Event, Timestamp};
/// use canopy_journal::{JournalWriter, WriteOptions};
///
/// let ts = Timestamp::now();
/// let batch = CommitBatch {
///     sequence: 1,
///     workspace: "default".to_string(),
///     timestamp: ts,
///     events: vec![Event::persist(ts, "admin", None)],
/// };
///
/// let mut writer = JournalWriter::open("default.cnj", WriteOptions::default())?;
/// writer.append_batch(&batch)?;
/// writer.finish()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalWriter {
    file: File,
    sync: bool,
    position: u64,
}

impl JournalWriter {
    /// Opens or creates a journal file for writing.
    ///
    /// An empty (or newly created) file receives a header, and so does a
    /// torn header when `options.repair_header` is set. An existing file
    /// must carry a valid header; it is opened for appending when
    /// `options.append` is `true` and truncated to its header otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the file cannot be opened, is not a valid
    /// journal, or is non-empty but shorter than a header.
    pub fn open<P: AsRef<Path>>(path: P, options: WriteOptions) -> Result<Self, JournalError> {
        let mut file = OpenOptions::new()
            .create(options.create)
            .write(true)
            .read(true)
            .open(path)?;

        let len = file.metadata()?.len();
        let header = JournalHeader::new().to_bytes();
        let header_len = header.len() as u64;
        let position = if len < header_len {
            if len > 0 && !(options.repair_header && is_torn_header(&mut file, &header, len)?) {
                return Err(JournalError::FileNotEmpty);
            }
            file.set_len(0)?;
            file.seek(io::SeekFrom::Start(0))?;
            file.write_all(&header)?;
            file.flush()?;
            if options.sync {
                file.sync_all()?;
            }
            header_len
        } else {
            let mut header_bytes = [0u8; JournalHeader::HEADER_SIZE];
            file.seek(io::SeekFrom::Start(0))?;
            file.read_exact(&mut header_bytes)?;
            JournalHeader::from_bytes(&header_bytes)?;
            if options.append {
                len
            } else {
                file.set_len(header_len)?;
                header_len
            }
        };
        file.seek(io::SeekFrom::Start(position))?;

        Ok(Self {
            file,
            sync: options.sync,
            position,
        })
    }

    /// Byte offset where the next frame will be written.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Appends one commit batch as a single frame.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if serialization fails, the payload exceeds
    /// the frame limit, or an I/O error occurs.
    pub fn append_batch(&mut self, batch: &CommitBatch) -> Result<(), JournalError> {
        let payload = encode_batch(batch)?;
        self.append_raw(FrameKind::CommitBatch, &payload)
    }

    /// Appends a raw frame with the given kind and payload.
    pub fn append_raw(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), JournalError> {
        let frame = RecordFrame::for_payload(kind, payload)?;

        // A failed earlier write may have moved the file cursor past `position`.
        self.file.seek(io::SeekFrom::Start(self.position))?;
        self.file.write_all(&frame.to_bytes())?;
        self.file.write_all(payload)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_data()?;
        }

        self.position += RecordFrame::FRAME_HEADER_SIZE as u64 + payload.len() as u64;
        Ok(())
    }

    /// Cuts the file back to `offset`, discarding a partially written frame.
    pub fn truncate_to(&mut self, offset: u64) -> Result<(), JournalError> {
        let offset = offset.max(JournalHeader::HEADER_SIZE as u64);
        self.file.set_len(offset)?;
        self.file.seek(io::SeekFrom::Start(offset))?;
        if self.sync {
            self.file.sync_all()?;
        }
        self.position = offset;
        Ok(())
    }

    /// Finishes writing and closes the file.
    pub fn finish(mut self) -> Result<(), JournalError> {
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

fn is_torn_header(file: &mut File, header: &[u8], len: u64) -> Result<bool, JournalError> {
    let mut existing = vec![0u8; len as usize];
    file.seek(io::SeekFrom::Start(0))?;
    file.read_exact(&mut existing)?;
    Ok(header.starts_with(&existing))
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        let _ = self.file.flush();
        if self.sync {
            let _ = self.file.sync_all();
        }
    }
}
