use crate::errors::CoreError;
use crate::identifiers::{NodeId, NodeTypeName, Timestamp};
use crate::path::ItemPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Info key carrying the source path of a move.
pub const INFO_SRC_ABS_PATH: &str = "srcAbsPath";
/// Info key carrying the destination path of a move.
pub const INFO_DEST_ABS_PATH: &str = "destAbsPath";

/// Kind of observed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A node was added.
    NodeAdded,
    /// A node was removed.
    NodeRemoved,
    /// A property was added.
    PropertyAdded,
    /// A property was removed.
    PropertyRemoved,
    /// A property value changed.
    PropertyChanged,
    /// A node was moved; emitted after the matching remove/add pair.
    NodeMoved,
    /// Commit boundary marker; always the last event of a batch.
    Persist,
}

impl EventType {
    /// Every event type, in bit order.
    pub const ALL: [EventType; 7] = [
        EventType::NodeAdded,
        EventType::NodeRemoved,
        EventType::PropertyAdded,
        EventType::PropertyRemoved,
        EventType::PropertyChanged,
        EventType::NodeMoved,
        EventType::Persist,
    ];

    /// Bit used for this type in an [`EventTypeMask`].
    pub const fn bit(self) -> u32 {
        match self {
            EventType::NodeAdded => 0x01,
            EventType::NodeRemoved => 0x02,
            EventType::PropertyAdded => 0x04,
            EventType::PropertyRemoved => 0x08,
            EventType::PropertyChanged => 0x10,
            EventType::NodeMoved => 0x20,
            EventType::Persist => 0x40,
        }
    }

    /// Resolves a single bit back to its type.
    pub fn from_bit(bit: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.bit() == bit)
    }

    /// Constant-style name, e.g. `NODE_ADDED`.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::NodeAdded => "NODE_ADDED",
            EventType::NodeRemoved => "NODE_REMOVED",
            EventType::PropertyAdded => "PROPERTY_ADDED",
            EventType::PropertyRemoved => "PROPERTY_REMOVED",
            EventType::PropertyChanged => "PROPERTY_CHANGED",
            EventType::NodeMoved => "NODE_MOVED",
            EventType::Persist => "PERSIST",
        }
    }

    /// True for the three node event types.
    pub fn is_node_event(self) -> bool {
        matches!(
            self,
            EventType::NodeAdded | EventType::NodeRemoved | EventType::NodeMoved
        )
    }

    /// True for the three property event types.
    pub fn is_property_event(self) -> bool {
        matches!(
            self,
            EventType::PropertyAdded | EventType::PropertyRemoved | EventType::PropertyChanged
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    /// Accepts `NODE_ADDED`, `node_added` and `node-added`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownEventType(s.to_string()))
    }
}

/// Bitwise OR of [`EventType`] bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTypeMask(u32);

impl EventTypeMask {
    /// Mask selecting every event type, PERSIST included.
    pub const ALL: EventTypeMask = EventTypeMask(0x7f);
    /// Mask selecting nothing.
    pub const NONE: EventTypeMask = EventTypeMask(0);

    /// Builds a mask from raw bits; unknown bits are dropped.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if `event_type` is selected.
    pub const fn contains(self, event_type: EventType) -> bool {
        self.0 & event_type.bit() != 0
    }

    /// Returns a copy with `event_type` added.
    pub const fn with(self, event_type: EventType) -> Self {
        Self(self.0 | event_type.bit())
    }

    /// True if no type is selected.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parses a comma separated list of type names.
    pub fn parse_list(list: &str) -> Result<Self, CoreError> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(EventType::from_str)
            .try_fold(Self::NONE, |mask, t| Ok(mask.with(t?)))
    }

    /// Selected types in bit order.
    pub fn types(self) -> impl Iterator<Item = EventType> {
        EventType::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl Default for EventTypeMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl From<EventType> for EventTypeMask {
    fn from(value: EventType) -> Self {
        Self(value.bit())
    }
}

impl FromIterator<EventType> for EventTypeMask {
    fn from_iter<I: IntoIterator<Item = EventType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

impl BitOr for EventTypeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<EventType> for EventTypeMask {
    type Output = Self;

    fn bitor(self, rhs: EventType) -> Self {
        self.with(rhs)
    }
}

impl BitOr for EventType {
    type Output = EventTypeMask;

    fn bitor(self, rhs: Self) -> EventTypeMask {
        EventTypeMask::from(self).with(rhs)
    }
}

impl BitOrAssign<EventType> for EventTypeMask {
    fn bitor_assign(&mut self, rhs: EventType) {
        *self = self.with(rhs);
    }
}

/// A single observed change, immutable once committed.
///
/// Events carry snapshots taken when the mutation was recorded
/// (`identifier`, `parent_identifier`, `node_types`), so filters resolve
/// against the state at event time rather than the live tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<ItemPath>,
    user_id: String,
    timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identifier: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_identifier: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    node_types: Vec<NodeTypeName>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    info: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_data: Option<String>,
}

impl Event {
    /// Builds the commit boundary marker.
    pub fn persist(timestamp: Timestamp, user_id: &str, user_data: Option<&str>) -> Self {
        Self {
            event_type: EventType::Persist,
            path: None,
            user_id: user_id.to_string(),
            timestamp,
            identifier: None,
            parent_identifier: None,
            node_types: Vec::new(),
            info: BTreeMap::new(),
            user_data: user_data.map(str::to_string),
        }
    }

    /// Event type.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Absolute path of the affected item; empty for PERSIST.
    pub fn path(&self) -> &str {
        self.path.as_ref().map(ItemPath::as_str).unwrap_or("")
    }

    /// Affected item path as a typed value; `None` for PERSIST.
    pub fn item_path(&self) -> Option<&ItemPath> {
        self.path.as_ref()
    }

    /// User that committed the change.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Commit timestamp.
    pub fn date(&self) -> Timestamp {
        self.timestamp
    }

    /// Identifier of the nearest referenceable ancestor-or-self of the associated node.
    pub fn identifier(&self) -> Option<&NodeId> {
        self.identifier.as_ref()
    }

    /// Identifier of the associated parent node, if it was referenceable.
    pub fn parent_identifier(&self) -> Option<&NodeId> {
        self.parent_identifier.as_ref()
    }

    /// Primary type and mixins of the associated node at event time.
    pub fn node_types(&self) -> &[NodeTypeName] {
        &self.node_types
    }

    /// Additional information (move source and destination).
    pub fn info(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    /// User data attached by the committing session.
    pub fn user_data(&self) -> Option<&str> {
        self.user_data.as_deref()
    }

    /// True for the commit boundary marker.
    pub fn is_persist(&self) -> bool {
        self.event_type == EventType::Persist
    }
}

/// A recorded mutation waiting for its commit timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Change type; never PERSIST.
    pub event_type: EventType,
    /// Affected item.
    pub path: ItemPath,
    /// Nearest referenceable ancestor-or-self of the associated node.
    pub identifier: Option<NodeId>,
    /// Identifier of the associated parent node.
    pub parent_identifier: Option<NodeId>,
    /// Types of the associated node.
    pub node_types: Vec<NodeTypeName>,
    /// Extra information.
    pub info: BTreeMap<String, String>,
}

impl ChangeRecord {
    /// Creates a record with no snapshots.
    pub fn new(event_type: EventType, path: ItemPath) -> Self {
        Self {
            event_type,
            path,
            identifier: None,
            parent_identifier: None,
            node_types: Vec::new(),
            info: BTreeMap::new(),
        }
    }

    /// Stamps the record with its commit metadata.
    pub fn into_event(self, timestamp: Timestamp, user_id: &str, user_data: Option<&str>) -> Event {
        Event {
            event_type: self.event_type,
            path: Some(self.path),
            user_id: user_id.to_string(),
            timestamp,
            identifier: self.identifier,
            parent_identifier: self.parent_identifier,
            node_types: self.node_types,
            info: self.info,
            user_data: user_data.map(str::to_string),
        }
    }
}

/// One committed batch as persisted in a workspace journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitBatch {
    /// 1-based commit number within the journal.
    pub sequence: u64,
    /// Workspace the batch belongs to.
    pub workspace: String,
    /// Shared timestamp of every event in the batch.
    pub timestamp: Timestamp,
    /// Change events followed by exactly one PERSIST.
    pub events: Vec<Event>,
}

impl CommitBatch {
    /// Checks the PERSIST framing rules for this batch.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_batch(&self.events)?;
        if self.events.iter().any(|e| e.date() != self.timestamp) {
            return Err(CoreError::InvalidBatch(format!(
                "commit {} has events outside its timestamp {}",
                self.sequence, self.timestamp
            )));
        }
        Ok(())
    }

    /// Events of the batch without the trailing PERSIST.
    pub fn changes(&self) -> &[Event] {
        match self.events.split_last() {
            Some((_, changes)) => changes,
            None => &[],
        }
    }
}

/// Checks that `events` form one commit: at least one change, exactly one
/// PERSIST at the end, a shared timestamp and no path on the marker.
pub fn validate_batch(events: &[Event]) -> Result<(), CoreError> {
    let Some((last, changes)) = events.split_last() else {
        return Err(CoreError::InvalidBatch("empty batch".to_string()));
    };
    if !last.is_persist() {
        return Err(CoreError::InvalidBatch(
            "batch does not end with PERSIST".to_string(),
        ));
    }
    if last.path.is_some() || last.identifier.is_some() {
        return Err(CoreError::InvalidBatch(
            "PERSIST carries a path or identifier".to_string(),
        ));
    }
    if changes.is_empty() {
        return Err(CoreError::InvalidBatch(
            "batch has no change events".to_string(),
        ));
    }
    if let Some(pos) = changes.iter().position(Event::is_persist) {
        return Err(CoreError::InvalidBatch(format!(
            "PERSIST at position {} is not last",
            pos
        )));
    }
    if let Some(event) = changes.iter().find(|e| e.date() != last.date()) {
        return Err(CoreError::InvalidBatch(format!(
            "{} {} at {} does not share commit timestamp {}",
            event.event_type(),
            event.path(),
            event.date(),
            last.date()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(event_type: EventType, path: &str) -> ChangeRecord {
        ChangeRecord::new(event_type, ItemPath::parse(path).unwrap())
    }

    fn batch(ts: i64) -> Vec<Event> {
        let ts = Timestamp::from_millis(ts);
        vec![
            change(EventType::NodeAdded, "/a").into_event(ts, "admin", None),
            Event::persist(ts, "admin", None),
        ]
    }

    #[test]
    fn mask_bits_follow_jcr_constants() {
        assert_eq!(EventType::NodeAdded.bit(), 1);
        assert_eq!(EventType::Persist.bit(), 64);
        let mask = EventType::NodeAdded | EventType::PropertyAdded;
        assert_eq!(mask.bits(), 5);
        assert!(mask.contains(EventType::PropertyAdded));
        assert!(!mask.contains(EventType::Persist));
        assert_eq!(EventTypeMask::from_bits(0xff), EventTypeMask::ALL);
        assert_eq!(EventType::from_bit(0x20), Some(EventType::NodeMoved));
    }

    #[test]
    fn parse_list_accepts_several_spellings() {
        let mask = EventTypeMask::parse_list("node-added, PROPERTY_CHANGED,persist").unwrap();
        let types: Vec<_> = mask.types().collect();
        assert_eq!(
            types,
            vec![EventType::NodeAdded, EventType::PropertyChanged, EventType::Persist]
        );
        assert!(EventTypeMask::parse_list("node-renamed").is_err());
    }

    #[test]
    fn persist_has_empty_path() {
        let event = Event::persist(Timestamp::from_millis(5), "admin", Some("import"));
        assert_eq!(event.path(), "");
        assert!(event.item_path().is_none());
        assert_eq!(event.user_data(), Some("import"));
    }

    #[test]
    fn validate_accepts_well_formed_batch() {
        assert!(validate_batch(&batch(10)).is_ok());
    }

    #[test]
    fn validate_rejects_missing_or_misplaced_persist() {
        let mut events = batch(10);
        events.pop();
        assert!(validate_batch(&events).is_err());

        let mut events = batch(10);
        events.swap(0, 1);
        assert!(validate_batch(&events).is_err());

        let ts = Timestamp::from_millis(10);
        assert!(validate_batch(&[Event::persist(ts, "admin", None)]).is_err());
        assert!(validate_batch(&[]).is_err());
    }

    #[test]
    fn validate_rejects_split_timestamps() {
        let events = vec![
            change(EventType::NodeAdded, "/a").into_event(Timestamp::from_millis(9), "admin", None),
            Event::persist(Timestamp::from_millis(10), "admin", None),
        ];
        assert!(validate_batch(&events).is_err());
    }

    #[test]
    fn event_serializes_with_type_name() {
        let events = batch(42);
        let json = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(json["type"], "NODE_ADDED");
        assert_eq!(json["path"], "/a");
        assert_eq!(json["timestamp"], 42);
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, events[0]);
    }
}
