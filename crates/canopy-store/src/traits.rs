//! Storage backend traits.

use crate::error::StoreError;
use canopy_core::{Event, Timestamp};
use std::sync::Arc;

/// Read side of an event journal: an append-only, time-ordered sequence.
///
/// Indexes are stable: the event at index `i` never changes once visible,
/// and new events only ever appear at the end.
pub trait EventSource: Send + Sync {
    /// Number of visible events.
    fn len(&self) -> usize;

    /// Returns true if no event has been appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the first event with a timestamp at or after `since`.
    fn lower_bound(&self, since: Timestamp) -> usize;

    /// Up to `max` events starting at `start`, in store order.
    fn read_range(&self, start: usize, max: usize) -> Vec<Arc<Event>>;

    /// Timestamp of the most recent event.
    fn last_timestamp(&self) -> Option<Timestamp>;
}

/// Result of a successful append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Sequence number assigned to the commit.
    pub sequence: u64,
    /// Shared timestamp of the commit's events.
    pub timestamp: Timestamp,
    /// Store index of the first event of the commit.
    pub first_index: usize,
    /// Number of events appended, PERSIST included.
    pub len: usize,
}

/// Write side of an event journal.
pub trait EventStore: EventSource {
    /// Workspace the store belongs to.
    fn workspace(&self) -> &str;

    /// Appends one commit (change events followed by PERSIST) atomically.
    ///
    /// Readers see either none or all of the batch.
    fn append(&self, events: Vec<Event>) -> Result<CommitReceipt, StoreError>;

    /// Shared read handle for cursors.
    fn source(&self) -> Arc<dyn EventSource>;

    /// Timestamp to stamp the next commit with: `now`, clamped so the
    /// journal never goes backwards.
    fn next_timestamp(&self, now: Timestamp) -> Timestamp {
        match self.last_timestamp() {
            Some(last) if last > now => last,
            _ => now,
        }
    }
}
