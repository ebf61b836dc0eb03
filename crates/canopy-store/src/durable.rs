//! Journal-backed event store.

use crate::error::StoreError;
use crate::memory::MemoryStore;
use crate::traits::{CommitReceipt, EventSource, EventStore};
use canopy_core::{CommitBatch, Event, Timestamp};
use canopy_journal::{verify_batch, JournalError, JournalReader, JournalWriter, ReadMode, WriteOptions};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Options for opening a [`DurableStore`].
#[derive(Debug, Clone, Default)]
pub struct DurableOptions {
    /// Options for the journal writer.
    pub write: WriteOptions,
    /// How a damaged journal tail is treated on replay.
    pub read_mode: ReadMode,
}

/// Event store that writes every commit to a journal file before publishing it.
///
/// The file is replayed into an in-memory index on open; reads are served
/// from the index.
pub struct DurableStore {
    index: MemoryStore,
    writer: Mutex<JournalWriter>,
    path: PathBuf,
}

/// Outcome of replaying a journal file.
#[derive(Debug)]
pub struct LoadedJournal {
    /// Index holding every replayed commit.
    pub index: MemoryStore,
    /// Byte offset just past the last intact commit.
    pub committed_offset: u64,
    /// Size of the file when it was read.
    pub file_len: u64,
    /// Why a permissive replay stopped early, if it did.
    pub damage: Option<JournalError>,
}

/// Replays a journal file into a fresh [`MemoryStore`].
///
/// Every batch is checked against its predecessor. In permissive mode a
/// damaged tail ends the replay; in strict mode it is an error.
pub fn load_journal(
    path: impl AsRef<Path>,
    workspace: &str,
    mode: ReadMode,
) -> Result<LoadedJournal, StoreError> {
    let mut reader = JournalReader::open(path.as_ref(), mode)?;
    let index = MemoryStore::new(workspace);
    let mut previous: Option<CommitBatch> = None;

    while let Some(batch) = reader.read_batch()? {
        verify_batch(&batch, previous.as_ref())?;
        if batch.workspace != workspace {
            return Err(JournalError::InvalidBatch {
                sequence: batch.sequence,
                reason: format!("belongs to workspace {}", batch.workspace),
            }
            .into());
        }
        index.publish(batch.clone())?;
        previous = Some(batch);
    }

    Ok(LoadedJournal {
        index,
        committed_offset: reader.committed_offset(),
        file_len: reader.file_len(),
        damage: reader.take_damage(),
    })
}

impl DurableStore {
    /// Opens (or creates) the journal at `path` and replays it.
    ///
    /// In permissive mode a torn trailing frame is cut off so new commits
    /// are appended right after the last intact one, and a torn header is
    /// rewritten. Damage anywhere else is never repaired: the file is left
    /// untouched and [`StoreError::DamagedJournal`] is returned.
    pub fn open(
        path: impl AsRef<Path>,
        workspace: &str,
        options: DurableOptions,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let write = WriteOptions {
            repair_header: options.write.repair_header || options.read_mode == ReadMode::Permissive,
            ..options.write
        };
        let mut writer = JournalWriter::open(&path, write)?;
        let loaded = load_journal(&path, workspace, options.read_mode)?;

        match loaded.damage {
            Some(JournalError::TruncatedFrame { .. }) => {
                warn!(
                    path = %path.display(),
                    committed = loaded.committed_offset,
                    file_len = loaded.file_len,
                    "dropping torn journal tail"
                );
                writer.truncate_to(loaded.committed_offset)?;
            }
            Some(damage) => {
                error!(
                    path = %path.display(),
                    offset = loaded.committed_offset,
                    file_len = loaded.file_len,
                    error = %damage,
                    "journal damaged before its tail"
                );
                return Err(StoreError::DamagedJournal {
                    offset: loaded.committed_offset,
                    trailing: loaded.file_len - loaded.committed_offset,
                    reason: damage.to_string(),
                });
            }
            None => {}
        }

        info!(
            path = %path.display(),
            workspace,
            commits = loaded.index.last_sequence(),
            events = loaded.index.len(),
            "opened event journal"
        );

        Ok(Self {
            index: loaded.index,
            writer: Mutex::new(writer),
            path,
        })
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number of the last commit, 0 when empty.
    pub fn last_sequence(&self) -> u64 {
        self.index.last_sequence()
    }
}

impl EventSource for DurableStore {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn lower_bound(&self, since: Timestamp) -> usize {
        self.index.lower_bound(since)
    }

    fn read_range(&self, start: usize, max: usize) -> Vec<Arc<Event>> {
        self.index.read_range(start, max)
    }

    fn last_timestamp(&self) -> Option<Timestamp> {
        self.index.last_timestamp()
    }
}

impl EventStore for DurableStore {
    fn workspace(&self) -> &str {
        self.index.workspace()
    }

    fn append(&self, events: Vec<Event>) -> Result<CommitReceipt, StoreError> {
        let mut writer = self.writer.lock();
        let batch = self.index.prepare(events)?;
        let rollback = writer.position();

        if let Err(err) = writer.append_batch(&batch) {
            if let Err(truncate_err) = writer.truncate_to(rollback) {
                error!(
                    path = %self.path.display(),
                    error = %truncate_err,
                    "failed to roll back partial journal write"
                );
            }
            return Err(err.into());
        }

        self.index.publish(batch)
    }

    fn source(&self) -> Arc<dyn EventSource> {
        self.index.source()
    }
}
