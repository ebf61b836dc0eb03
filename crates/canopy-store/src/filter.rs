//! Event filtering API for selective event iteration.
//!
//! Criteria are small predicates over [`Event`]; [`JournalFilter`] is the
//! conjunction used by journals and listeners. A PERSIST marker carries no
//! path, identifier or node types, so it only survives a filter that
//! constrains nothing but the event type (and whose mask selects PERSIST),
//! unless commit markers are explicitly kept.

use canopy_core::{Event, EventType, EventTypeMask, ItemPath, NodeId, NodeTypeName, Timestamp};
use std::sync::Arc;

/// Trait for filtering events during iteration.
pub trait EventFilter: Send + Sync {
    /// Returns true if the event matches the filter criteria.
    fn matches(&self, event: &Event) -> bool;
}

impl<T: EventFilter + ?Sized> EventFilter for Box<T> {
    fn matches(&self, event: &Event) -> bool {
        (**self).matches(event)
    }
}

impl<T: EventFilter + ?Sized> EventFilter for Arc<T> {
    fn matches(&self, event: &Event) -> bool {
        (**self).matches(event)
    }
}

/// Filter by event type bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTypeFilter {
    /// Selected event types.
    pub mask: EventTypeMask,
}

impl EventFilter for EventTypeFilter {
    fn matches(&self, event: &Event) -> bool {
        self.mask.contains(event.event_type())
    }
}

/// Filter by absolute path, optionally including the whole subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFilter {
    /// Path to match.
    pub path: ItemPath,
    /// Also match descendants of `path`.
    pub deep: bool,
}

impl EventFilter for PathFilter {
    fn matches(&self, event: &Event) -> bool {
        match event.item_path() {
            None => false,
            Some(path) if self.deep => path.is_same_or_descendant_of(&self.path),
            Some(path) => *path == self.path,
        }
    }
}

/// Filter by the identifier of the event's associated parent node.
///
/// An empty set matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierFilter {
    /// Accepted identifiers.
    pub identifiers: Vec<NodeId>,
}

impl EventFilter for IdentifierFilter {
    fn matches(&self, event: &Event) -> bool {
        event
            .parent_identifier()
            .map(|id| self.identifiers.contains(id))
            .unwrap_or(false)
    }
}

/// Filter by the primary or mixin types of the associated node.
///
/// Names match exactly; an empty set or unknown names match nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTypeFilter {
    /// Accepted node type names.
    pub node_types: Vec<NodeTypeName>,
}

impl EventFilter for NodeTypeFilter {
    fn matches(&self, event: &Event) -> bool {
        event
            .node_types()
            .iter()
            .any(|t| self.node_types.contains(t))
    }
}

/// Filter by time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRangeFilter {
    /// Include events at or after this timestamp.
    pub after: Option<Timestamp>,
    /// Include events at or before this timestamp.
    pub before: Option<Timestamp>,
}

impl EventFilter for TimeRangeFilter {
    fn matches(&self, event: &Event) -> bool {
        let date = event.date();
        self.after.map_or(true, |after| date >= after)
            && self.before.map_or(true, |before| date <= before)
    }
}

/// Filter by committing user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    /// User ID to match.
    pub user_id: String,
}

impl EventFilter for UserFilter {
    fn matches(&self, event: &Event) -> bool {
        event.user_id() == self.user_id
    }
}

/// Composite filter: all filters must match (AND).
#[derive(Default)]
pub struct AndFilter {
    /// Filters to combine with AND logic.
    pub filters: Vec<Box<dyn EventFilter>>,
}

impl EventFilter for AndFilter {
    fn matches(&self, event: &Event) -> bool {
        self.filters.iter().all(|f| f.matches(event))
    }
}

/// Composite filter: any filter must match (OR).
#[derive(Default)]
pub struct OrFilter {
    /// Filters to combine with OR logic.
    pub filters: Vec<Box<dyn EventFilter>>,
}

impl EventFilter for OrFilter {
    fn matches(&self, event: &Event) -> bool {
        self.filters.iter().any(|f| f.matches(event))
    }
}

/// Conjunction of the observation criteria.
///
/// Omitted criteria are vacuously true. A present but empty identifier or
/// node type list matches nothing.
///
/// ```
/// use canopy_core::EventType;
/// use canopy_store::JournalFilter;
///
/// let filter = JournalFilter::new()
///     .event_types(EventType::NodeAdded | EventType::NodeRemoved)
///     .path("/content".parse()?, true);
/// # Ok::<(), canopy_core::ValidationError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalFilter {
    event_types: Option<EventTypeFilter>,
    path: Option<PathFilter>,
    identifiers: Option<IdentifierFilter>,
    node_types: Option<NodeTypeFilter>,
    keep_commit_markers: bool,
}

impl JournalFilter {
    /// Filter that accepts every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given event types.
    pub fn event_types(mut self, mask: impl Into<EventTypeMask>) -> Self {
        self.event_types = Some(EventTypeFilter { mask: mask.into() });
        self
    }

    /// Restricts to `path`, or to its subtree when `deep` is set.
    pub fn path(mut self, path: ItemPath, deep: bool) -> Self {
        self.path = Some(PathFilter { path, deep });
        self
    }

    /// Restricts to events whose associated parent node has one of `identifiers`.
    pub fn identifiers(mut self, identifiers: impl IntoIterator<Item = NodeId>) -> Self {
        self.identifiers = Some(IdentifierFilter {
            identifiers: identifiers.into_iter().collect(),
        });
        self
    }

    /// Restricts to events whose associated node had one of `node_types`.
    pub fn node_types(mut self, node_types: impl IntoIterator<Item = NodeTypeName>) -> Self {
        self.node_types = Some(NodeTypeFilter {
            node_types: node_types.into_iter().collect(),
        });
        self
    }

    /// Lets PERSIST markers through regardless of the other criteria.
    pub fn keep_commit_markers(mut self, keep: bool) -> Self {
        self.keep_commit_markers = keep;
        self
    }

    /// True if no criterion is set.
    pub fn is_unfiltered(&self) -> bool {
        self.event_types.is_none()
            && self.path.is_none()
            && self.identifiers.is_none()
            && self.node_types.is_none()
    }
}

impl EventFilter for JournalFilter {
    fn matches(&self, event: &Event) -> bool {
        if self.keep_commit_markers && event.event_type() == EventType::Persist {
            return true;
        }
        self.event_types.as_ref().map_or(true, |f| f.matches(event))
            && self.path.as_ref().map_or(true, |f| f.matches(event))
            && self.identifiers.as_ref().map_or(true, |f| f.matches(event))
            && self.node_types.as_ref().map_or(true, |f| f.matches(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::ChangeRecord;

    fn event(event_type: EventType, path: &str) -> Event {
        ChangeRecord::new(event_type, ItemPath::parse(path).unwrap()).into_event(
            Timestamp::from_millis(100),
            "admin",
            None,
        )
    }

    fn persist() -> Event {
        Event::persist(Timestamp::from_millis(100), "admin", None)
    }

    fn typed(node_types: &[&str]) -> Event {
        let mut record = ChangeRecord::new(EventType::NodeAdded, ItemPath::parse("/n").unwrap());
        record.node_types = node_types
            .iter()
            .map(|t| NodeTypeName::parse(*t).unwrap())
            .collect();
        record.into_event(Timestamp::from_millis(100), "admin", None)
    }

    #[test]
    fn unfiltered_accepts_everything() {
        let filter = JournalFilter::new();
        assert!(filter.is_unfiltered());
        assert!(filter.matches(&event(EventType::NodeAdded, "/a")));
        assert!(filter.matches(&persist()));
    }

    #[test]
    fn type_mask_decides_persist() {
        let filter = JournalFilter::new().event_types(EventType::PropertyAdded);
        assert!(filter.matches(&event(EventType::PropertyAdded, "/a/p")));
        assert!(!filter.matches(&event(EventType::NodeAdded, "/a")));
        assert!(!filter.matches(&persist()));

        let with_persist =
            JournalFilter::new().event_types(EventType::PropertyAdded | EventType::Persist);
        assert!(with_persist.matches(&persist()));
    }

    #[test]
    fn path_filter_shallow_and_deep() {
        let child = ItemPath::parse("/child").unwrap();
        let shallow = JournalFilter::new().path(child.clone(), false);
        let deep = JournalFilter::new().path(child, true);

        assert!(shallow.matches(&event(EventType::NodeAdded, "/child")));
        assert!(!shallow.matches(&event(EventType::PropertyAdded, "/child/prop")));
        assert!(deep.matches(&event(EventType::PropertyAdded, "/child/prop")));
        assert!(!deep.matches(&event(EventType::NodeAdded, "/children")));
        assert!(!deep.matches(&persist()));
    }

    #[test]
    fn empty_identifier_list_matches_nothing() {
        let filter = JournalFilter::new().identifiers(Vec::new());
        assert!(!filter.matches(&event(EventType::NodeAdded, "/a")));
        assert!(!filter.matches(&persist()));
    }

    #[test]
    fn identifier_filter_uses_parent_identifier() {
        let id = NodeId::generate();
        let mut record = ChangeRecord::new(EventType::PropertyAdded, ItemPath::parse("/ref").unwrap());
        record.parent_identifier = Some(id);
        let matching = record.into_event(Timestamp::from_millis(1), "admin", None);

        let filter = JournalFilter::new().identifiers([id]);
        assert!(filter.matches(&matching));
        assert!(!filter.matches(&event(EventType::PropertyAdded, "/other")));
    }

    #[test]
    fn node_type_filter_is_exact() {
        let filter = JournalFilter::new()
            .node_types([NodeTypeName::parse("nt:unstructured").unwrap()]);
        assert!(filter.matches(&typed(&["nt:unstructured"])));
        assert!(filter.matches(&typed(&["nt:folder", "nt:unstructured"])));
        assert!(!filter.matches(&typed(&["nt:base"])));
        assert!(!filter.matches(&typed(&[])));

        let empty = JournalFilter::new().node_types(Vec::new());
        assert!(!empty.matches(&typed(&["nt:unstructured"])));
    }

    #[test]
    fn commit_markers_can_be_kept() {
        let filter = JournalFilter::new()
            .path(ItemPath::parse("/child").unwrap(), true)
            .keep_commit_markers(true);
        assert!(filter.matches(&persist()));
        assert!(!filter.matches(&event(EventType::NodeAdded, "/other")));
    }

    #[test]
    fn composite_filters() {
        let and = AndFilter {
            filters: vec![
                Box::new(UserFilter { user_id: "admin".to_string() }),
                Box::new(TimeRangeFilter {
                    after: Some(Timestamp::from_millis(50)),
                    before: None,
                }),
            ],
        };
        assert!(and.matches(&event(EventType::NodeAdded, "/a")));

        let or = OrFilter {
            filters: vec![
                Box::new(UserFilter { user_id: "anonymous".to_string() }),
                Box::new(EventTypeFilter { mask: EventType::NodeAdded.into() }),
            ],
        };
        assert!(or.matches(&event(EventType::NodeAdded, "/a")));
        assert!(!or.matches(&persist()));
    }
}
