//! Journal reader implementation.

use crate::errors::JournalError;
use crate::frame::{FrameKind, JournalHeader, RecordFrame};
use crate::record::decode_batch;
use canopy_core::CommitBatch;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

/// Read mode for handling a damaged tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Strict mode: truncated or corrupted frames are errors.
    #[default]
    Strict,
    /// Permissive mode: the first truncated or corrupted frame ends the journal.
    Permissive,
}

/// Journal reader for replaying commit batches from a journal file.
///
/// The reader supports two modes:
/// - [`ReadMode::Strict`] - Truncated or corrupted frames are errors
/// - [`ReadMode::Permissive`] - They are treated as end-of-file
///
/// A commit is one frame, so a torn write never yields part of a commit.
///
/// # Example
///
/// ```rust,no_run
/// use canopy_journal::{JournalReader, ReadMode};
///
/// let mut reader = JournalReader::open("default.cnj", ReadMode::Strict)?;
/// while let Some(batch) = reader.read_batch()? {
///     println!("commit {} with {} events", batch.sequence, batch.events.len());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalReader {
    file: BufReader<File>,
    file_len: u64,
    mode: ReadMode,
    position: u64,
    committed: u64,
    damage: Option<JournalError>,
}

impl JournalReader {
    /// Opens a journal file for reading.
    ///
    /// The file header is validated and the reader is positioned at the first
    /// record frame after the header.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the file cannot be opened, the header is
    /// invalid, or an I/O error occurs.
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<Self, JournalError> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut header_bytes = [0u8; JournalHeader::HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;
        JournalHeader::from_bytes(&header_bytes)?;
        let position = JournalHeader::HEADER_SIZE as u64;

        Ok(Self {
            file: BufReader::new(file),
            file_len,
            mode,
            position,
            committed: position,
            damage: None,
        })
    }

    /// Returns the current read position in the file.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Byte offset just past the last complete, checksummed frame.
    ///
    /// After a permissive read stops at a damaged tail this is the length the
    /// file should be cut back to before appending again.
    pub fn committed_offset(&self) -> u64 {
        self.committed
    }

    /// Size of the file when it was opened.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Why a permissive read stopped before the end of the file, if it did.
    pub fn damage(&self) -> Option<&JournalError> {
        self.damage.as_ref()
    }

    /// True if the read stopped at a frame cut short by the end of the file,
    /// the shape a torn write leaves behind.
    pub fn has_torn_tail(&self) -> bool {
        matches!(self.damage, Some(JournalError::TruncatedFrame { .. }))
    }

    /// Takes the damage found by a permissive read.
    pub fn take_damage(&mut self) -> Option<JournalError> {
        self.damage.take()
    }

    fn damaged(&mut self, err: JournalError) -> Result<Option<(FrameKind, Vec<u8>)>, JournalError> {
        match self.mode {
            ReadMode::Permissive => {
                self.damage = Some(err);
                Ok(None)
            }
            ReadMode::Strict => Err(err),
        }
    }

    /// Reads the next frame from the journal.
    ///
    /// Returns `Ok(None)` at end-of-file (or at a damaged tail in permissive mode).
    pub fn read_frame(&mut self) -> Result<Option<(FrameKind, Vec<u8>)>, JournalError> {
        if self.position >= self.file_len {
            return Ok(None);
        }
        self.file.seek(io::SeekFrom::Start(self.position))?;
        let frame_start = self.position;

        let mut frame_header_bytes = [0u8; RecordFrame::FRAME_HEADER_SIZE];
        match self.file.read_exact(&mut frame_header_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return self.damaged(JournalError::TruncatedFrame {
                    offset: frame_start,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let frame = match RecordFrame::from_bytes(&frame_header_bytes, frame_start) {
            Ok(frame) => frame,
            Err(e) => return self.damaged(e),
        };

        let mut payload = vec![0u8; frame.len as usize];
        match self.file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return self.damaged(JournalError::TruncatedFrame {
                    offset: frame_start,
                });
            }
            Err(e) => return Err(e.into()),
        }

        if !frame.matches(&payload) {
            return self.damaged(JournalError::InvalidFrame {
                offset: frame_start,
                reason: "payload checksum mismatch".to_string(),
            });
        }

        self.position = frame_start + RecordFrame::FRAME_HEADER_SIZE as u64 + frame.len as u64;
        self.committed = self.position;

        Ok(Some((frame.kind, payload)))
    }

    /// Reads the next commit batch from the journal.
    ///
    /// Skips unknown frame kinds and returns `Ok(None)` at end-of-file.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if a frame is invalid, the payload is not a
    /// commit batch, truncation is detected in strict mode, or I/O fails.
    pub fn read_batch(&mut self) -> Result<Option<CommitBatch>, JournalError> {
        loop {
            match self.read_frame()? {
                None => return Ok(None),
                Some((FrameKind::CommitBatch, payload)) => {
                    return decode_batch(&payload).map(Some);
                }
                Some((FrameKind::Unknown(_), _)) => continue,
            }
        }
    }
}

impl Iterator for JournalReader {
    type Item = Result<CommitBatch, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_batch().transpose()
    }
}
