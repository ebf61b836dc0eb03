//! Change recording at the commit boundary.

use canopy_core::{ChangeRecord, Event, Timestamp};

/// Receives one record per observable mutation, in mutation order.
pub trait ChangeSink {
    /// Records a change.
    fn record(&mut self, change: ChangeRecord);
}

/// Discards every change. Used for session-local working copies.
impl ChangeSink for () {
    fn record(&mut self, _change: ChangeRecord) {}
}

/// Buffers the changes of one in-progress commit.
///
/// Nothing recorded here is visible until [`seal`](Self::seal) turns the
/// buffer into a framed batch; dropping the recorder discards it.
#[derive(Debug, Default)]
pub struct ChangeRecorder {
    changes: Vec<ChangeRecord>,
}

impl ChangeRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if nothing observable happened.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of buffered changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Buffered changes in order.
    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    /// Stamps every change with the commit metadata and closes the batch
    /// with a PERSIST marker.
    pub fn seal(self, timestamp: Timestamp, user_id: &str, user_data: Option<&str>) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .changes
            .into_iter()
            .map(|change| change.into_event(timestamp, user_id, user_data))
            .collect();
        events.push(Event::persist(timestamp, user_id, user_data));
        events
    }
}

impl ChangeSink for ChangeRecorder {
    fn record(&mut self, change: ChangeRecord) {
        self.changes.push(change);
    }
}
