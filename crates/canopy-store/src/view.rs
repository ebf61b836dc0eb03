//! Commit-level view over an event journal.

use crate::cursor::EventJournal;
use crate::filter::EventFilter;
use canopy_core::{Event, EventType, Timestamp};
use std::sync::Arc;

/// The change events of one commit, as seen through a journal's filter.
#[derive(Debug, Clone)]
pub struct CommitView {
    /// Commit timestamp.
    pub timestamp: Timestamp,
    /// User that committed.
    pub user_id: String,
    /// User data attached to the commit.
    pub user_data: Option<String>,
    /// Change events that passed the filter, in store order.
    pub changes: Vec<Arc<Event>>,
}

impl CommitView {
    /// Number of changes of the given type.
    pub fn count(&self, event_type: EventType) -> usize {
        self.changes
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

/// Collects events up to and including the next PERSIST marker.
///
/// The journal's filter must keep commit markers (see
/// [`JournalFilter::keep_commit_markers`](crate::JournalFilter::keep_commit_markers)),
/// otherwise commits cannot be told apart. Returns `None` once the journal is
/// exhausted; trailing events without a marker are dropped.
pub fn next_commit<F: EventFilter>(journal: &mut EventJournal<F>) -> Option<CommitView> {
    let mut changes = Vec::new();
    for event in journal.events() {
        if event.is_persist() {
            return Some(CommitView {
                timestamp: event.date(),
                user_id: event.user_id().to_string(),
                user_data: event.user_data().map(str::to_string),
                changes,
            });
        }
        changes.push(event);
    }
    None
}

/// Collects every remaining commit of `journal`.
pub fn commits<F: EventFilter>(journal: &mut EventJournal<F>) -> Vec<CommitView> {
    std::iter::from_fn(|| next_commit(journal)).collect()
}
