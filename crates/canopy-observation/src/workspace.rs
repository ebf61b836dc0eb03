//! Shared state of one workspace: committed tree, event store, listeners.

use crate::clock::Clock;
use crate::dispatch::ObservationRegistry;
use crate::error::RepositoryError;
use crate::recorder::ChangeRecorder;
use crate::session::SessionId;
use crate::tree::{Tree, TreeOp};
use canopy_core::{Event, WorkspaceName};
use canopy_store::{CommitReceipt, EventJournal, EventSource, EventStore, JournalFilter};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Result of a commit.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Store receipt, or `None` if the operations produced no events.
    pub receipt: Option<CommitReceipt>,
    /// Committed tree after the commit.
    pub tree: Arc<Tree>,
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<(SessionId, Vec<Arc<Event>>)>,
    draining: bool,
}

/// A named tree with its own event journal and listener registry.
///
/// Commits are serialized by a per-workspace lock. Listener delivery runs
/// after the lock is released, in commit order: batches are queued under
/// the lock and drained by whichever committing thread gets there first.
pub struct Workspace {
    name: WorkspaceName,
    tree: RwLock<Arc<Tree>>,
    commit_lock: Mutex<()>,
    outbox: Mutex<Outbox>,
    store: Arc<dyn EventStore>,
    registry: Arc<ObservationRegistry>,
    clock: Arc<dyn Clock>,
    page_size: usize,
}

impl Workspace {
    /// Creates a workspace with a fresh tree over `store`.
    pub fn new(
        name: WorkspaceName,
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        page_size: usize,
    ) -> Result<Self, RepositoryError> {
        Ok(Self {
            name,
            tree: RwLock::new(Arc::new(Tree::new()?)),
            commit_lock: Mutex::new(()),
            outbox: Mutex::new(Outbox::default()),
            store,
            registry: ObservationRegistry::new(),
            clock,
            page_size,
        })
    }

    /// Workspace name.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Current committed tree.
    pub fn snapshot(&self) -> Arc<Tree> {
        Arc::clone(&self.tree.read())
    }

    /// Listener registry.
    pub fn registry(&self) -> &Arc<ObservationRegistry> {
        &self.registry
    }

    /// Read handle on the event store.
    pub fn source(&self) -> Arc<dyn EventSource> {
        self.store.source()
    }

    /// Opens a cursor over this workspace's journal.
    pub fn event_journal(&self, filter: JournalFilter) -> EventJournal {
        EventJournal::new(self.store.source(), filter).with_page_size(self.page_size)
    }

    /// Applies `ops` to the committed tree as one commit.
    ///
    /// Either every operation applies and the batch is durable in the store,
    /// or the tree and store are left untouched. Listeners are notified once
    /// the commit is visible.
    pub fn commit(
        &self,
        origin: SessionId,
        user_id: &str,
        user_data: Option<&str>,
        ops: &[TreeOp],
    ) -> Result<CommitOutcome, RepositoryError> {
        let guard = self.commit_lock.lock();

        let base = self.snapshot();
        let mut next = Tree::clone(&base);
        let mut recorder = ChangeRecorder::new();
        for op in ops {
            next.apply(op, &mut recorder)?;
        }
        if recorder.is_empty() {
            return Ok(CommitOutcome {
                receipt: None,
                tree: base,
            });
        }

        let timestamp = self.store.next_timestamp(self.clock.now());
        let changes = recorder.len();
        let receipt = self.store.append(recorder.seal(timestamp, user_id, user_data))?;

        let next = Arc::new(next);
        *self.tree.write() = Arc::clone(&next);
        let published = self.store.read_range(receipt.first_index, receipt.len);
        self.outbox.lock().queue.push_back((origin, published));
        drop(guard);

        debug!(
            workspace = %self.name,
            sequence = receipt.sequence,
            changes,
            timestamp = %timestamp,
            "committed changes"
        );
        self.drain();

        Ok(CommitOutcome {
            receipt: Some(receipt),
            tree: next,
        })
    }

    fn drain(&self) {
        {
            let mut outbox = self.outbox.lock();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        loop {
            let (origin, events) = {
                let mut outbox = self.outbox.lock();
                match outbox.queue.pop_front() {
                    Some(entry) => entry,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            self.registry.publish(origin, &events);
        }
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("name", &self.name)
            .field("events", &self.store.len())
            .field("registry", &self.registry)
            .finish()
    }
}
