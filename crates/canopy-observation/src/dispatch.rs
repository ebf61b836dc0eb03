//! Live delivery of committed events to registered listeners.
//!
//! Each listener is an independent subscription on its workspace with its
//! own filter. Delivery happens after the commit is durable; a listener that
//! returns an error or panics is logged and skipped without affecting the
//! commit or the other listeners.

use crate::session::SessionId;
use canopy_core::Event;
use canopy_store::{EventFilter, JournalFilter};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{error, warn};

/// Error type returned by listeners.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives the events of each commit that pass its filter.
pub trait EventListener: Send + Sync {
    /// Called once per commit with at least one matching event.
    fn on_event(&self, batch: &EventBatch) -> Result<(), ListenerError>;
}

impl<F> EventListener for F
where
    F: Fn(&EventBatch) -> Result<(), ListenerError> + Send + Sync,
{
    fn on_event(&self, batch: &EventBatch) -> Result<(), ListenerError> {
        self(batch)
    }
}

/// The matching events of one commit, in store order.
#[derive(Debug, Clone)]
pub struct EventBatch {
    events: Vec<Arc<Event>>,
    local: bool,
}

impl EventBatch {
    /// Events of the batch.
    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    /// Iterates the events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|e| e.as_ref())
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if the batch holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// True if the commit came from the listener's own session.
    pub fn is_local(&self) -> bool {
        self.local
    }
}

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Subscription {
    id: ListenerId,
    session: SessionId,
    listener: Arc<dyn EventListener>,
    filter: JournalFilter,
    no_local: bool,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that accepted their batch.
    pub delivered: usize,
    /// Listeners that returned an error.
    pub failed: usize,
    /// Listeners that panicked.
    pub panicked: usize,
}

/// Listener registry of one workspace.
#[derive(Default)]
pub struct ObservationRegistry {
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    next_id: AtomicU64,
}

impl ObservationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `listener` for `session`.
    pub fn subscribe(
        self: &Arc<Self>,
        session: SessionId,
        listener: Arc<dyn EventListener>,
        filter: JournalFilter,
        no_local: bool,
    ) -> ListenerHandle {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.subscriptions.write().push(Arc::new(Subscription {
            id,
            session,
            listener,
            filter,
            no_local,
        }));
        ListenerHandle {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Removes every listener of `session`; returns how many were removed.
    pub fn unsubscribe_session(&self, session: SessionId) -> usize {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.session != session);
        before - subscriptions.len()
    }

    /// Listeners registered by `session`, in registration order.
    pub fn listeners_of(&self, session: SessionId) -> Vec<ListenerId> {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.session == session)
            .map(|s| s.id)
            .collect()
    }

    /// Total number of registered listeners.
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// True if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }

    /// Delivers one committed batch from `origin` to every subscription.
    ///
    /// Works on a snapshot of the registry, so listeners may register or
    /// remove listeners (or commit) from inside `on_event`.
    pub fn publish(&self, origin: SessionId, events: &[Arc<Event>]) -> DispatchReport {
        let subscriptions = self.subscriptions.read().clone();
        let mut report = DispatchReport::default();

        for sub in subscriptions {
            let local = sub.session == origin;
            if local && sub.no_local {
                continue;
            }
            let matched: Vec<Arc<Event>> = events
                .iter()
                .filter(|e| sub.filter.matches(e))
                .cloned()
                .collect();
            if matched.is_empty() {
                continue;
            }
            let batch = EventBatch {
                events: matched,
                local,
            };

            match catch_unwind(AssertUnwindSafe(|| sub.listener.on_event(&batch))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    warn!(listener = %sub.id, error = %err, "event listener failed");
                    report.failed += 1;
                }
                Err(payload) => {
                    error!(
                        listener = %sub.id,
                        panic = panic_message(payload.as_ref()),
                        "event listener panicked"
                    );
                    report.panicked += 1;
                }
            }
        }
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle keeps the listener registered; call
/// [`remove`](Self::remove) or log the session out to stop delivery.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    registry: Weak<ObservationRegistry>,
}

impl ListenerHandle {
    /// Listener identifier.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Deregisters the listener. Returns false if it was already gone.
    pub fn remove(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.unsubscribe(self.id),
            None => false,
        }
    }
}

impl fmt::Debug for ObservationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::{ChangeRecord, EventType, ItemPath, Timestamp};
    use parking_lot::Mutex;

    fn batch() -> Vec<Arc<Event>> {
        let ts = Timestamp::from_millis(5);
        vec![
            Arc::new(
                ChangeRecord::new(EventType::NodeAdded, ItemPath::parse("/a").unwrap())
                    .into_event(ts, "admin", None),
            ),
            Arc::new(Event::persist(ts, "admin", None)),
        ]
    }

    fn recorder() -> (Arc<Mutex<Vec<usize>>>, Arc<dyn EventListener>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = move |batch: &EventBatch| -> Result<(), ListenerError> {
            sink.lock().push(batch.len());
            Ok(())
        };
        (seen, Arc::new(listener))
    }

    #[test]
    fn filters_per_subscription() {
        let registry = ObservationRegistry::new();
        let origin = SessionId::generate();
        let (all, all_listener) = recorder();
        let (nodes, nodes_listener) = recorder();
        registry.subscribe(origin, all_listener, JournalFilter::new(), false);
        registry.subscribe(
            origin,
            nodes_listener,
            JournalFilter::new().event_types(EventType::NodeAdded),
            false,
        );

        let report = registry.publish(origin, &batch());
        assert_eq!(report.delivered, 2);
        assert_eq!(*all.lock(), vec![2]);
        assert_eq!(*nodes.lock(), vec![1]);
    }

    #[test]
    fn no_local_skips_own_session() {
        let registry = ObservationRegistry::new();
        let own = SessionId::generate();
        let (seen, listener) = recorder();
        registry.subscribe(own, listener, JournalFilter::new(), true);

        registry.publish(own, &batch());
        assert!(seen.lock().is_empty());
        registry.publish(SessionId::generate(), &batch());
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn failing_and_panicking_listeners_are_isolated() {
        let registry = ObservationRegistry::new();
        let session = SessionId::generate();
        let failing = |_: &EventBatch| -> Result<(), ListenerError> { Err("boom".into()) };
        let panicking = |_: &EventBatch| -> Result<(), ListenerError> { panic!("listener bug") };
        let (seen, healthy) = recorder();
        registry.subscribe(session, Arc::new(failing), JournalFilter::new(), false);
        registry.subscribe(session, Arc::new(panicking), JournalFilter::new(), false);
        registry.subscribe(session, healthy, JournalFilter::new(), false);

        let report = registry.publish(session, &batch());
        assert_eq!(
            report,
            DispatchReport {
                delivered: 1,
                failed: 1,
                panicked: 1
            }
        );
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn handles_and_sessions_unsubscribe() {
        let registry = ObservationRegistry::new();
        let session = SessionId::generate();
        let (_, first) = recorder();
        let (_, second) = recorder();
        let handle = registry.subscribe(session, first, JournalFilter::new(), false);
        registry.subscribe(session, second, JournalFilter::new(), false);
        assert_eq!(registry.listeners_of(session).len(), 2);

        assert!(handle.clone().remove());
        assert!(!handle.remove());
        assert_eq!(registry.unsubscribe_session(session), 1);
        assert!(registry.is_empty());
    }
}
