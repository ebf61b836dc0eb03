//! In-memory event store.

use crate::error::StoreError;
use crate::traits::{CommitReceipt, EventSource, EventStore};
use canopy_core::{CommitBatch, Event, Timestamp};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Arc<Event>>,
    last_sequence: u64,
    last_timestamp: Option<Timestamp>,
}

impl Inner {
    fn next_batch(&self, workspace: &str, events: Vec<Event>) -> Result<CommitBatch, StoreError> {
        let timestamp = match events.last() {
            Some(event) => event.date(),
            None => Timestamp::MIN,
        };
        let batch = CommitBatch {
            sequence: self.last_sequence + 1,
            workspace: workspace.to_string(),
            timestamp,
            events,
        };
        self.check(&batch)?;
        Ok(batch)
    }

    fn check(&self, batch: &CommitBatch) -> Result<(), StoreError> {
        batch.validate()?;
        if batch.sequence != self.last_sequence + 1 {
            return Err(StoreError::SequenceGap {
                expected: self.last_sequence + 1,
                found: batch.sequence,
            });
        }
        if let Some(last) = self.last_timestamp {
            if batch.timestamp < last {
                return Err(StoreError::NonMonotonicTimestamp {
                    last,
                    attempted: batch.timestamp,
                });
            }
        }
        Ok(())
    }

    fn push(&mut self, batch: CommitBatch) -> CommitReceipt {
        let receipt = CommitReceipt {
            sequence: batch.sequence,
            timestamp: batch.timestamp,
            first_index: self.events.len(),
            len: batch.events.len(),
        };
        self.events.extend(batch.events.into_iter().map(Arc::new));
        self.last_sequence = batch.sequence;
        self.last_timestamp = Some(batch.timestamp);
        receipt
    }
}

/// Append-only event store held in memory.
///
/// Cloning yields another handle to the same journal. Appends take the write
/// lock for the whole batch, so readers never observe part of a commit.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    workspace: Arc<str>,
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Creates an empty store for `workspace`.
    pub fn new(workspace: impl AsRef<str>) -> Self {
        Self {
            workspace: Arc::from(workspace.as_ref()),
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Sequence number of the last commit, 0 when empty.
    pub fn last_sequence(&self) -> u64 {
        self.inner.read().last_sequence
    }

    /// Numbers and validates `events` as the next commit without appending it.
    pub fn prepare(&self, events: Vec<Event>) -> Result<CommitBatch, StoreError> {
        self.inner.read().next_batch(&self.workspace, events)
    }

    /// Appends an already numbered batch, e.g. one replayed from a journal file.
    pub fn publish(&self, batch: CommitBatch) -> Result<CommitReceipt, StoreError> {
        let mut inner = self.inner.write();
        inner.check(&batch)?;
        Ok(inner.push(batch))
    }
}

impl EventSource for MemoryStore {
    fn len(&self) -> usize {
        self.inner.read().events.len()
    }

    fn lower_bound(&self, since: Timestamp) -> usize {
        self.inner
            .read()
            .events
            .partition_point(|event| event.date() < since)
    }

    fn read_range(&self, start: usize, max: usize) -> Vec<Arc<Event>> {
        let inner = self.inner.read();
        let start = start.min(inner.events.len());
        let end = start.saturating_add(max).min(inner.events.len());
        inner.events[start..end].to_vec()
    }

    fn last_timestamp(&self) -> Option<Timestamp> {
        self.inner.read().last_timestamp
    }
}

impl EventStore for MemoryStore {
    fn workspace(&self) -> &str {
        &self.workspace
    }

    fn append(&self, events: Vec<Event>) -> Result<CommitReceipt, StoreError> {
        let mut inner = self.inner.write();
        let batch = inner.next_batch(&self.workspace, events)?;
        Ok(inner.push(batch))
    }

    fn source(&self) -> Arc<dyn EventSource> {
        Arc::new(self.clone())
    }
}
