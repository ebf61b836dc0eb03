//! Session-facing observation API.

use crate::dispatch::{EventListener, ListenerHandle, ListenerId};
use crate::error::RepositoryError;
use crate::session::SessionShared;
use crate::workspace::Workspace;
use canopy_core::{EventTypeMask, ItemPath, NodeId, NodeTypeName};
use canopy_store::{EventJournal, JournalFilter};
use std::sync::Arc;

/// Criteria for a journal or a listener. Omitted criteria match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalQuery {
    /// Event types to include.
    pub event_types: Option<EventTypeMask>,
    /// Path the events must be at (or below, with `deep`).
    pub path: Option<ItemPath>,
    /// Include events below `path`.
    pub deep: bool,
    /// Identifiers of the associated parent nodes.
    pub identifiers: Option<Vec<NodeId>>,
    /// Node type names recorded on the events.
    pub node_types: Option<Vec<NodeTypeName>>,
}

impl JournalQuery {
    /// Query matching every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the event types.
    pub fn event_types(mut self, mask: impl Into<EventTypeMask>) -> Self {
        self.event_types = Some(mask.into());
        self
    }

    /// Restricts to `path`, or to its subtree when `deep`.
    pub fn path(mut self, path: ItemPath, deep: bool) -> Self {
        self.path = Some(path);
        self.deep = deep;
        self
    }

    /// Restricts to the given parent identifiers.
    pub fn identifiers(mut self, identifiers: impl IntoIterator<Item = NodeId>) -> Self {
        self.identifiers = Some(identifiers.into_iter().collect());
        self
    }

    /// Restricts to the given node types.
    pub fn node_types(mut self, node_types: impl IntoIterator<Item = NodeTypeName>) -> Self {
        self.node_types = Some(node_types.into_iter().collect());
        self
    }

    /// Builds the equivalent filter.
    pub fn into_filter(self) -> JournalFilter {
        let mut filter = JournalFilter::new();
        if let Some(mask) = self.event_types {
            filter = filter.event_types(mask);
        }
        if let Some(path) = self.path {
            filter = filter.path(path, self.deep);
        }
        if let Some(identifiers) = self.identifiers {
            filter = filter.identifiers(identifiers);
        }
        if let Some(node_types) = self.node_types {
            filter = filter.node_types(node_types);
        }
        filter
    }
}

/// Registration options for a listener.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenerOptions {
    /// Events the listener wants.
    pub query: JournalQuery,
    /// Skip commits made by the registering session.
    pub no_local: bool,
}

impl ListenerOptions {
    /// Options with the given query.
    pub fn new(query: JournalQuery) -> Self {
        Self {
            query,
            no_local: false,
        }
    }

    /// Skips commits of the registering session.
    pub fn no_local(mut self, no_local: bool) -> Self {
        self.no_local = no_local;
        self
    }
}

/// Observation entry point of one session.
#[derive(Clone)]
pub struct ObservationManager {
    workspace: Arc<Workspace>,
    session: Arc<SessionShared>,
}

impl ObservationManager {
    pub(crate) fn new(workspace: Arc<Workspace>, session: Arc<SessionShared>) -> Self {
        Self { workspace, session }
    }

    /// Opens a cursor over the workspace journal.
    ///
    /// The cursor starts before the first event and sees commits made after
    /// it was opened.
    pub fn get_event_journal(&self, query: JournalQuery) -> Result<EventJournal, RepositoryError> {
        self.session.ensure_live()?;
        Ok(self.workspace.event_journal(query.into_filter()))
    }

    /// Registers a listener for future commits of the workspace.
    pub fn add_event_listener(
        &self,
        listener: impl EventListener + 'static,
        options: ListenerOptions,
    ) -> Result<ListenerHandle, RepositoryError> {
        self.session.ensure_live()?;
        Ok(self.workspace.registry().subscribe(
            self.session.id,
            Arc::new(listener),
            options.query.into_filter(),
            options.no_local,
        ))
    }

    /// Deregisters a listener of this session. Returns false if unknown.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let registry = self.workspace.registry();
        registry.listeners_of(self.session.id).contains(&id) && registry.unsubscribe(id)
    }

    /// Listeners registered through this session.
    pub fn registered_event_listeners(&self) -> Vec<ListenerId> {
        self.workspace.registry().listeners_of(self.session.id)
    }

    /// Sets the user data attached to the session's next commits.
    pub fn set_user_data(&self, user_data: Option<&str>) {
        *self.session.user_data.lock() = user_data.map(str::to_string);
    }
}

impl std::fmt::Debug for ObservationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationManager")
            .field("workspace", &self.workspace.name())
            .field("session", &self.session.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::EventType;

    #[test]
    fn empty_query_is_unfiltered() {
        assert!(JournalQuery::new().into_filter().is_unfiltered());
    }

    #[test]
    fn query_maps_onto_filter() {
        let path = ItemPath::parse("/child").unwrap();
        let filter = JournalQuery::new()
            .event_types(EventType::NodeAdded | EventType::NodeRemoved)
            .path(path.clone(), true)
            .into_filter();
        let expected = JournalFilter::new()
            .event_types(EventType::NodeAdded | EventType::NodeRemoved)
            .path(path, true);
        assert_eq!(filter, expected);
    }
}
