//! Lazy, forward-only cursor over a filtered event journal.

use crate::error::StoreError;
use crate::filter::{EventFilter, JournalFilter};
use crate::traits::EventSource;
use canopy_core::{Event, Timestamp};
use std::collections::VecDeque;
use std::sync::Arc;

/// Number of raw events fetched from the source per read.
pub const DEFAULT_PAGE_SIZE: usize = 64;

#[derive(Debug, Clone)]
enum CursorState {
    BeforeFirst,
    Positioned(Arc<Event>),
    Exhausted,
}

/// Cursor over the events of one workspace journal that pass a filter.
///
/// A fresh journal is before its first event. [`skip_to`](Self::skip_to)
/// positions it at the first matching event at or after a time;
/// [`next`](Self::next) moves forward. Events are fetched page by page and
/// filtered lazily, so opening a journal costs nothing and events committed
/// after it was opened are picked up as the cursor reaches them.
///
/// ```
/// use canopy_core::{ChangeRecord, Event, EventType, ItemPath, Timestamp};
/// use canopy_store::{EventJournal, EventStore, JournalFilter, MemoryStore};
///
/// let store = MemoryStore::new("default");
/// let ts = Timestamp::from_millis(1_000);
/// store.append(vec![
///     ChangeRecord::new(EventType::NodeAdded, ItemPath::parse("/a")?).into_event(ts, "admin", None),
///     Event::persist(ts, "admin", None),
/// ])?;
///
/// let mut journal = EventJournal::new(store.source(), JournalFilter::new());
/// journal.skip_to(Timestamp::from_millis(0));
/// assert_eq!(journal.current()?.path(), "/a");
/// journal.next();
/// assert!(journal.current()?.is_persist());
/// journal.next();
/// assert!(!journal.valid());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EventJournal<F = JournalFilter> {
    source: Arc<dyn EventSource>,
    filter: F,
    state: CursorState,
    next_index: usize,
    buffer: VecDeque<Arc<Event>>,
    page_size: usize,
    position: u64,
}

impl<F: EventFilter> EventJournal<F> {
    /// Creates a cursor before the first event of `source`.
    pub fn new(source: Arc<dyn EventSource>, filter: F) -> Self {
        Self {
            source,
            filter,
            state: CursorState::BeforeFirst,
            next_index: 0,
            buffer: VecDeque::new(),
            page_size: DEFAULT_PAGE_SIZE,
            position: 0,
        }
    }

    /// Sets how many raw events are fetched per read.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Filter applied to every event.
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Moves to the first matching event with a timestamp at or after `date`.
    ///
    /// Works from any state, including after the journal was exhausted.
    pub fn skip_to(&mut self, date: Timestamp) {
        self.next_index = self.source.lower_bound(date);
        self.buffer.clear();
        self.position = 0;
        self.state = self.fetch();
    }

    /// True if the cursor is positioned on an event.
    pub fn valid(&self) -> bool {
        matches!(self.state, CursorState::Positioned(_))
    }

    /// Event the cursor is positioned on.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IllegalState`] before the first event and after
    /// the last one.
    pub fn current(&self) -> Result<&Event, StoreError> {
        match &self.state {
            CursorState::Positioned(event) => Ok(event),
            CursorState::BeforeFirst => Err(StoreError::IllegalState(
                "journal is not positioned yet; call skip_to or next",
            )),
            CursorState::Exhausted => {
                Err(StoreError::IllegalState("journal has no more events"))
            }
        }
    }

    /// Advances to the next matching event and returns whether one was found.
    ///
    /// Before the first event this positions on the first match from the
    /// start of the journal. Once exhausted it re-checks the source, so
    /// events committed since become visible.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        if let CursorState::Positioned(_) = self.state {
            self.position += 1;
        }
        self.state = self.fetch();
        self.valid()
    }

    /// Moves past `count` events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IllegalState`] if the journal runs out first.
    pub fn skip(&mut self, count: u64) -> Result<(), StoreError> {
        if matches!(self.state, CursorState::BeforeFirst) && count > 0 && !self.next() {
            return Err(StoreError::IllegalState("skipped past the end of the journal"));
        }
        for _ in 0..count {
            if !self.valid() {
                return Err(StoreError::IllegalState("skipped past the end of the journal"));
            }
            self.next();
        }
        Ok(())
    }

    /// Number of events the cursor has moved past since the last `skip_to`.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterator yielding the current event and every following match.
    pub fn events(&mut self) -> Events<'_, F> {
        Events { journal: self }
    }

    fn fetch(&mut self) -> CursorState {
        loop {
            if self.buffer.is_empty() {
                let page = self.source.read_range(self.next_index, self.page_size);
                if page.is_empty() {
                    return CursorState::Exhausted;
                }
                self.next_index += page.len();
                self.buffer.extend(page);
            }
            while let Some(event) = self.buffer.pop_front() {
                if self.filter.matches(&event) {
                    return CursorState::Positioned(event);
                }
            }
        }
    }
}

/// Draining iterator returned by [`EventJournal::events`].
///
/// Like [`EventJournal::next`], it re-checks the source once exhausted, so it
/// may yield again after returning `None`.
pub struct Events<'a, F> {
    journal: &'a mut EventJournal<F>,
}

impl<F: EventFilter> Iterator for Events<'_, F> {
    type Item = Arc<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.journal.valid() {
            self.journal.next();
        }
        let event = match &self.journal.state {
            CursorState::Positioned(event) => Arc::clone(event),
            _ => return None,
        };
        self.journal.next();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::traits::EventStore;
    use canopy_core::{ChangeRecord, EventType, ItemPath};

    fn commit(store: &MemoryStore, ts: i64, paths: &[&str]) {
        let ts = Timestamp::from_millis(ts);
        let mut events: Vec<Event> = paths
            .iter()
            .map(|p| {
                ChangeRecord::new(EventType::NodeAdded, ItemPath::parse(*p).unwrap())
                    .into_event(ts, "admin", None)
            })
            .collect();
        events.push(Event::persist(ts, "admin", None));
        store.append(events).unwrap();
    }

    fn paths<F: EventFilter>(journal: &mut EventJournal<F>) -> Vec<String> {
        journal.events().map(|e| e.path().to_string()).collect()
    }

    #[test]
    fn fresh_journal_is_before_first() {
        let store = MemoryStore::new("default");
        commit(&store, 10, &["/a"]);
        let journal = EventJournal::new(store.source(), JournalFilter::new());
        assert!(!journal.valid());
        assert!(matches!(journal.current(), Err(StoreError::IllegalState(_))));
    }

    #[test]
    fn next_from_before_first_starts_at_beginning() {
        let store = MemoryStore::new("default");
        commit(&store, 10, &["/a"]);
        let mut journal = EventJournal::new(store.source(), JournalFilter::new());
        assert!(journal.next());
        assert_eq!(journal.current().unwrap().path(), "/a");
    }

    #[test]
    fn skip_to_discards_earlier_events() {
        let store = MemoryStore::new("default");
        commit(&store, 10, &["/a"]);
        commit(&store, 20, &["/b"]);
        let mut journal = EventJournal::new(store.source(), JournalFilter::new());
        journal.skip_to(Timestamp::from_millis(15));
        assert_eq!(paths(&mut journal), vec!["/b", ""]);
        assert!(!journal.valid());
    }

    #[test]
    fn skip_to_after_exhaustion_requeries() {
        let store = MemoryStore::new("default");
        commit(&store, 10, &["/a"]);
        let mut journal = EventJournal::new(store.source(), JournalFilter::new());
        journal.skip_to(Timestamp::from_millis(11));
        assert!(!journal.valid());
        journal.skip_to(Timestamp::from_millis(10));
        assert!(journal.valid());
    }

    #[test]
    fn exhausted_journal_sees_later_commits() {
        let store = MemoryStore::new("default");
        commit(&store, 10, &["/a"]);
        let mut journal = EventJournal::new(store.source(), JournalFilter::new());
        journal.skip_to(Timestamp::from_millis(0));
        assert_eq!(paths(&mut journal).len(), 2);

        commit(&store, 20, &["/b"]);
        assert!(journal.next());
        assert_eq!(journal.current().unwrap().path(), "/b");
    }

    #[test]
    fn exhausted_iterator_sees_later_commits() {
        let store = MemoryStore::new("default");
        commit(&store, 10, &["/a"]);
        let mut journal = EventJournal::new(store.source(), JournalFilter::new());
        assert_eq!(paths(&mut journal), vec!["/a", ""]);
        assert!(paths(&mut journal).is_empty());

        commit(&store, 20, &["/b"]);
        assert_eq!(paths(&mut journal), vec!["/b", ""]);
        assert!(!journal.valid());
    }

    #[test]
    fn filter_spans_pages() {
        let store = MemoryStore::new("default");
        for i in 0..10 {
            commit(&store, 10 + i, &[format!("/n{}", i).as_str()]);
        }
        let filter = JournalFilter::new().path(ItemPath::parse("/n7").unwrap(), false);
        let mut journal = EventJournal::new(store.source(), filter).with_page_size(3);
        journal.skip_to(Timestamp::from_millis(0));
        assert_eq!(paths(&mut journal), vec!["/n7"]);
    }

    #[test]
    fn skip_and_position() {
        let store = MemoryStore::new("default");
        commit(&store, 10, &["/a", "/b", "/c"]);
        let mut journal = EventJournal::new(store.source(), JournalFilter::new());
        journal.skip_to(Timestamp::from_millis(0));
        journal.skip(2).unwrap();
        assert_eq!(journal.position(), 2);
        assert_eq!(journal.current().unwrap().path(), "/c");
        assert!(journal.skip(5).is_err());
    }

    #[test]
    fn cursors_are_independent() {
        let store = MemoryStore::new("default");
        commit(&store, 10, &["/a"]);
        let mut first = EventJournal::new(store.source(), JournalFilter::new());
        let mut second = EventJournal::new(store.source(), JournalFilter::new());
        first.skip_to(Timestamp::from_millis(0));
        first.next();
        second.skip_to(Timestamp::from_millis(0));
        assert_eq!(second.current().unwrap().path(), "/a");
        assert!(first.current().unwrap().is_persist());
    }
}
