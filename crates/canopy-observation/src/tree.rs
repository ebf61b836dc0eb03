//! In-memory reference tree of nodes and properties.
//!
//! Every mutation goes through [`Tree::apply`], which validates the whole
//! operation before touching the tree and reports what it did to a
//! [`ChangeSink`]. Snapshots (identifiers, node types) are taken from the
//! tree as it is at that moment.

use crate::error::RepositoryError;
use crate::recorder::ChangeSink;
use canopy_core::{
    validate_name, ChangeRecord, EventType, ItemPath, NodeId, NodeTypeName, Timestamp,
    INFO_DEST_ABS_PATH, INFO_SRC_ABS_PATH,
};
use std::collections::{BTreeMap, HashMap};

/// Name of the primary type property.
pub const JCR_PRIMARY_TYPE: &str = "jcr:primaryType";
/// Name of the mixin types property.
pub const JCR_MIXIN_TYPES: &str = "jcr:mixinTypes";
/// Name of the identifier property of referenceable nodes.
pub const JCR_UUID: &str = "jcr:uuid";
/// Name of the protected system node below the root.
pub const JCR_SYSTEM: &str = "jcr:system";
/// Mixin that gives a node a durable identifier.
pub const MIX_REFERENCEABLE: &str = "mix:referenceable";
/// Default primary type of new nodes.
pub const NT_UNSTRUCTURED: &str = "nt:unstructured";
/// Primary type of the root node.
pub const REP_ROOT: &str = "rep:root";
/// Primary type of the system node.
pub const REP_SYSTEM: &str = "rep:system";

const PROTECTED_PROPERTIES: [&str; 3] = [JCR_PRIMARY_TYPE, JCR_MIXIN_TYPES, JCR_UUID];

/// Returns true for properties the repository maintains itself.
pub fn is_protected_property(name: &str) -> bool {
    PROTECTED_PROPERTIES.contains(&name)
}

/// Value of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// UTF-8 string.
    String(String),
    /// 64-bit integer.
    Long(i64),
    /// Double precision float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
    /// Point in time.
    Date(Timestamp),
    /// Qualified name.
    Name(String),
    /// List of qualified names.
    Names(Vec<String>),
    /// Identifier of a referenceable node.
    Reference(NodeId),
    /// Identifier of a node that may not exist.
    WeakReference(NodeId),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<Timestamp> for PropertyValue {
    fn from(value: Timestamp) -> Self {
        PropertyValue::Date(value)
    }
}

/// A structural mutation, replayable against any tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeOp {
    /// Add a node with the given primary type.
    AddNode {
        /// Path of the new node.
        path: ItemPath,
        /// Primary type.
        primary_type: NodeTypeName,
    },
    /// Add or change a property.
    SetProperty {
        /// Owning node.
        node: ItemPath,
        /// Property name.
        name: String,
        /// New value.
        value: PropertyValue,
    },
    /// Remove a property.
    RemoveProperty {
        /// Owning node.
        node: ItemPath,
        /// Property name.
        name: String,
    },
    /// Remove a node and its subtree.
    RemoveNode {
        /// Node to remove.
        path: ItemPath,
    },
    /// Move (and possibly rename) a node.
    MoveNode {
        /// Current path.
        src: ItemPath,
        /// New path.
        dest: ItemPath,
    },
    /// Add a mixin type.
    AddMixin {
        /// Target node.
        path: ItemPath,
        /// Mixin to add.
        mixin: NodeTypeName,
        /// Identifier assigned if the mixin makes the node referenceable.
        identifier: NodeId,
    },
}

type NodeKey = u64;

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    parent: Option<NodeKey>,
    primary_type: NodeTypeName,
    mixins: Vec<NodeTypeName>,
    identifier: Option<NodeId>,
    properties: BTreeMap<String, PropertyValue>,
    children: Vec<NodeKey>,
    protected: bool,
}

impl NodeData {
    fn new(name: &str, parent: Option<NodeKey>, primary_type: NodeTypeName) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(
            JCR_PRIMARY_TYPE.to_string(),
            PropertyValue::Name(primary_type.to_string()),
        );
        Self {
            name: name.to_string(),
            parent,
            primary_type,
            mixins: Vec::new(),
            identifier: None,
            properties,
            children: Vec::new(),
            protected: false,
        }
    }

    fn types(&self) -> Vec<NodeTypeName> {
        std::iter::once(self.primary_type.clone())
            .chain(self.mixins.iter().cloned())
            .collect()
    }
}

/// Hierarchy of nodes rooted at `/`.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: HashMap<NodeKey, NodeData>,
    root: NodeKey,
    next_key: NodeKey,
}

/// Read-only view of one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    data: &'a NodeData,
    tree: &'a Tree,
}

impl<'a> NodeView<'a> {
    /// Node name; empty for the root.
    pub fn name(&self) -> &'a str {
        &self.data.name
    }

    /// Primary type.
    pub fn primary_type(&self) -> &'a NodeTypeName {
        &self.data.primary_type
    }

    /// Mixin types in the order they were added.
    pub fn mixins(&self) -> &'a [NodeTypeName] {
        &self.data.mixins
    }

    /// Identifier, if the node is referenceable.
    pub fn identifier(&self) -> Option<NodeId> {
        self.data.identifier
    }

    /// True for repository-maintained nodes such as `/jcr:system`.
    pub fn is_protected(&self) -> bool {
        self.data.protected
    }

    /// Property value by name.
    pub fn property(&self, name: &str) -> Option<&'a PropertyValue> {
        self.data.properties.get(name)
    }

    /// Properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&'a str, &'a PropertyValue)> {
        self.data.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Child node names in insertion order.
    pub fn child_names(&self) -> Vec<&'a str> {
        let tree = self.tree;
        self.data
            .children
            .iter()
            .filter_map(|key| tree.nodes.get(key))
            .map(|child| child.name.as_str())
            .collect()
    }
}

impl Tree {
    /// Creates a tree holding the root (`rep:root`) and `/jcr:system`.
    pub fn new() -> Result<Self, RepositoryError> {
        let mut tree = Self {
            nodes: HashMap::new(),
            root: 0,
            next_key: 1,
        };
        tree.nodes
            .insert(0, NodeData::new("", None, NodeTypeName::parse(REP_ROOT)?));

        let mut system = NodeData::new(JCR_SYSTEM, Some(0), NodeTypeName::parse(REP_SYSTEM)?);
        system.protected = true;
        tree.insert_child(0, system)?;
        Ok(tree)
    }

    /// Node at `path`.
    pub fn node(&self, path: &ItemPath) -> Option<NodeView<'_>> {
        let key = self.resolve(path)?;
        self.view(key)
    }

    /// Property at `path`.
    pub fn property(&self, path: &ItemPath) -> Option<&PropertyValue> {
        let key = self.resolve(&path.parent()?)?;
        self.nodes.get(&key)?.properties.get(path.name())
    }

    /// True if a node or a property exists at `path`.
    pub fn item_exists(&self, path: &ItemPath) -> bool {
        self.resolve(path).is_some() || self.property(path).is_some()
    }

    /// Path of the referenceable node with `identifier`.
    pub fn path_of(&self, identifier: &NodeId) -> Option<ItemPath> {
        let (key, _) = self
            .nodes
            .iter()
            .find(|(_, data)| data.identifier.as_ref() == Some(identifier))?;
        let mut names = Vec::new();
        let mut cursor = Some(*key);
        while let Some(k) = cursor {
            let data = self.nodes.get(&k)?;
            if data.parent.is_some() {
                names.push(data.name.as_str());
            }
            cursor = data.parent;
        }
        names
            .into_iter()
            .rev()
            .try_fold(ItemPath::root(), |path, name| path.join(name))
            .ok()
    }

    /// Removal operations for every non-protected child of the root.
    pub fn purge_ops(&self) -> Vec<TreeOp> {
        let Some(root) = self.nodes.get(&self.root) else {
            return Vec::new();
        };
        root.children
            .iter()
            .filter_map(|key| self.nodes.get(key))
            .filter(|child| !child.protected)
            .filter_map(|child| ItemPath::root().join(&child.name).ok())
            .map(|path| TreeOp::RemoveNode { path })
            .collect()
    }

    /// Applies one operation, reporting its changes to `sink`.
    ///
    /// The operation is fully validated first; on error the tree is unchanged
    /// and nothing has been recorded.
    pub fn apply(&mut self, op: &TreeOp, sink: &mut impl ChangeSink) -> Result<(), RepositoryError> {
        match op {
            TreeOp::AddNode { path, primary_type } => self.add_node(path, primary_type, sink),
            TreeOp::SetProperty { node, name, value } => {
                self.set_property(node, name, value, sink)
            }
            TreeOp::RemoveProperty { node, name } => self.remove_property(node, name, sink),
            TreeOp::RemoveNode { path } => self.remove_node(path, sink),
            TreeOp::MoveNode { src, dest } => self.move_node(src, dest, sink),
            TreeOp::AddMixin {
                path,
                mixin,
                identifier,
            } => self.add_mixin(path, mixin, *identifier, sink),
        }
    }

    fn add_node(
        &mut self,
        path: &ItemPath,
        primary_type: &NodeTypeName,
        sink: &mut impl ChangeSink,
    ) -> Result<(), RepositoryError> {
        let parent_path = path
            .parent()
            .ok_or_else(|| RepositoryError::ItemExists(path.to_string()))?;
        let parent = self.existing(&parent_path)?;
        if self.item_exists(path) {
            return Err(RepositoryError::ItemExists(path.to_string()));
        }
        if self.data(parent)?.protected {
            return Err(protected(&parent_path));
        }

        let identifier = self.nearest_identifier(parent);
        let parent_identifier = self.data(parent)?.identifier;
        let node = NodeData::new(path.name(), Some(parent), primary_type.clone());
        let key = self.insert_child(parent, node)?;

        let mut added = ChangeRecord::new(EventType::NodeAdded, path.clone());
        added.identifier = identifier;
        added.parent_identifier = parent_identifier;
        added.node_types = self.data(key)?.types();
        sink.record(added);

        let mut type_prop =
            ChangeRecord::new(EventType::PropertyAdded, path.join(JCR_PRIMARY_TYPE)?);
        type_prop.identifier = identifier;
        sink.record(type_prop);
        Ok(())
    }

    fn set_property(
        &mut self,
        node: &ItemPath,
        name: &str,
        value: &PropertyValue,
        sink: &mut impl ChangeSink,
    ) -> Result<(), RepositoryError> {
        validate_name(name)?;
        let prop_path = node.join(name)?;
        if is_protected_property(name) {
            return Err(protected(&prop_path));
        }
        let key = self.existing(node)?;
        if self.resolve(&prop_path).is_some() {
            return Err(RepositoryError::ItemExists(prop_path.to_string()));
        }
        let data = self.data(key)?;
        if data.protected {
            return Err(protected(node));
        }
        let event_type = match data.properties.get(name) {
            Some(old) if old == value => return Ok(()),
            Some(_) => EventType::PropertyChanged,
            None => EventType::PropertyAdded,
        };

        let record = self.property_record(event_type, prop_path, key)?;
        self.data_mut(key)?
            .properties
            .insert(name.to_string(), value.clone());
        sink.record(record);
        Ok(())
    }

    fn remove_property(
        &mut self,
        node: &ItemPath,
        name: &str,
        sink: &mut impl ChangeSink,
    ) -> Result<(), RepositoryError> {
        let prop_path = node.join(name)?;
        if is_protected_property(name) {
            return Err(protected(&prop_path));
        }
        let key = self.existing(node)?;
        if !self.data(key)?.properties.contains_key(name) {
            return Err(RepositoryError::PathNotFound(prop_path.to_string()));
        }

        let record = self.property_record(EventType::PropertyRemoved, prop_path, key)?;
        self.data_mut(key)?.properties.remove(name);
        sink.record(record);
        Ok(())
    }

    fn remove_node(
        &mut self,
        path: &ItemPath,
        sink: &mut impl ChangeSink,
    ) -> Result<(), RepositoryError> {
        if path.is_root() {
            return Err(RepositoryError::InvalidOperation(
                "the root node cannot be removed".to_string(),
            ));
        }
        let key = self.existing(path)?;
        let data = self.data(key)?;
        if data.protected {
            return Err(protected(path));
        }

        let record = self.node_record(EventType::NodeRemoved, path.clone(), key)?;
        self.detach(key)?;
        self.drop_subtree(key);
        sink.record(record);
        Ok(())
    }

    fn move_node(
        &mut self,
        src: &ItemPath,
        dest: &ItemPath,
        sink: &mut impl ChangeSink,
    ) -> Result<(), RepositoryError> {
        if src.is_root() {
            return Err(RepositoryError::InvalidOperation(
                "the root node cannot be moved".to_string(),
            ));
        }
        let key = self.existing(src)?;
        if self.data(key)?.protected {
            return Err(protected(src));
        }
        if dest.is_same_or_descendant_of(src) {
            return Err(RepositoryError::InvalidOperation(format!(
                "cannot move {} into its own subtree at {}",
                src, dest
            )));
        }
        let dest_parent_path = dest
            .parent()
            .ok_or_else(|| RepositoryError::ItemExists(dest.to_string()))?;
        let dest_parent = self.existing(&dest_parent_path)?;
        if self.data(dest_parent)?.protected {
            return Err(protected(&dest_parent_path));
        }
        if self.item_exists(dest) {
            return Err(RepositoryError::ItemExists(dest.to_string()));
        }

        let removed = self.node_record(EventType::NodeRemoved, src.clone(), key)?;

        self.detach(key)?;
        {
            let data = self.data_mut(key)?;
            data.name = dest.name().to_string();
            data.parent = Some(dest_parent);
        }
        self.data_mut(dest_parent)?.children.push(key);

        let added = self.node_record(EventType::NodeAdded, dest.clone(), key)?;
        let mut moved = self.node_record(EventType::NodeMoved, dest.clone(), key)?;
        moved
            .info
            .insert(INFO_SRC_ABS_PATH.to_string(), src.to_string());
        moved
            .info
            .insert(INFO_DEST_ABS_PATH.to_string(), dest.to_string());

        sink.record(removed);
        sink.record(added);
        sink.record(moved);
        Ok(())
    }

    fn add_mixin(
        &mut self,
        path: &ItemPath,
        mixin: &NodeTypeName,
        identifier: NodeId,
        sink: &mut impl ChangeSink,
    ) -> Result<(), RepositoryError> {
        let key = self.existing(path)?;
        let data = self.data(key)?;
        if data.protected {
            return Err(protected(path));
        }
        if data.mixins.contains(mixin) {
            return Ok(());
        }

        let mixin_event = if data.mixins.is_empty() {
            EventType::PropertyAdded
        } else {
            EventType::PropertyChanged
        };
        let gains_identifier = mixin.as_str() == MIX_REFERENCEABLE && data.identifier.is_none();

        // Type facet properties carry no node type snapshot.
        let snapshot_identifier = self.nearest_identifier(key);
        let snapshot_parent = data.identifier;
        let facet = |event_type, name: &str| -> Result<ChangeRecord, RepositoryError> {
            let mut record = ChangeRecord::new(event_type, path.join(name)?);
            record.identifier = snapshot_identifier;
            record.parent_identifier = snapshot_parent;
            Ok(record)
        };
        let mixin_record = facet(mixin_event, JCR_MIXIN_TYPES)?;
        let uuid_record = if gains_identifier {
            Some(facet(EventType::PropertyAdded, JCR_UUID)?)
        } else {
            None
        };

        let data = self.data_mut(key)?;
        data.mixins.push(mixin.clone());
        let names = data.mixins.iter().map(ToString::to_string).collect();
        data.properties
            .insert(JCR_MIXIN_TYPES.to_string(), PropertyValue::Names(names));
        if gains_identifier {
            data.identifier = Some(identifier);
            data.properties.insert(
                JCR_UUID.to_string(),
                PropertyValue::String(identifier.to_string()),
            );
        }

        sink.record(mixin_record);
        if let Some(record) = uuid_record {
            sink.record(record);
        }
        Ok(())
    }

    fn node_record(
        &self,
        event_type: EventType,
        path: ItemPath,
        key: NodeKey,
    ) -> Result<ChangeRecord, RepositoryError> {
        let data = self.data(key)?;
        let mut record = ChangeRecord::new(event_type, path);
        record.identifier = self.nearest_identifier(key);
        record.parent_identifier = data
            .parent
            .and_then(|parent| self.nodes.get(&parent))
            .and_then(|parent| parent.identifier);
        record.node_types = data.types();
        Ok(record)
    }

    fn property_record(
        &self,
        event_type: EventType,
        path: ItemPath,
        owner: NodeKey,
    ) -> Result<ChangeRecord, RepositoryError> {
        let data = self.data(owner)?;
        let mut record = ChangeRecord::new(event_type, path);
        record.identifier = self.nearest_identifier(owner);
        record.parent_identifier = data.identifier;
        record.node_types = data.types();
        Ok(record)
    }

    fn view(&self, key: NodeKey) -> Option<NodeView<'_>> {
        Some(NodeView {
            data: self.nodes.get(&key)?,
            tree: self,
        })
    }

    fn resolve(&self, path: &ItemPath) -> Option<NodeKey> {
        let mut key = self.root;
        for segment in path.segments() {
            key = self
                .nodes
                .get(&key)?
                .children
                .iter()
                .copied()
                .find(|child| {
                    self.nodes
                        .get(child)
                        .map_or(false, |data| data.name == segment)
                })?;
        }
        Some(key)
    }

    fn existing(&self, path: &ItemPath) -> Result<NodeKey, RepositoryError> {
        self.resolve(path)
            .ok_or_else(|| RepositoryError::PathNotFound(path.to_string()))
    }

    fn data(&self, key: NodeKey) -> Result<&NodeData, RepositoryError> {
        self.nodes.get(&key).ok_or_else(dangling)
    }

    fn data_mut(&mut self, key: NodeKey) -> Result<&mut NodeData, RepositoryError> {
        self.nodes.get_mut(&key).ok_or_else(dangling)
    }

    fn nearest_identifier(&self, key: NodeKey) -> Option<NodeId> {
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let data = self.nodes.get(&k)?;
            if data.identifier.is_some() {
                return data.identifier;
            }
            cursor = data.parent;
        }
        None
    }

    fn insert_child(&mut self, parent: NodeKey, data: NodeData) -> Result<NodeKey, RepositoryError> {
        let key = self.next_key;
        self.next_key += 1;
        self.data_mut(parent)?.children.push(key);
        self.nodes.insert(key, data);
        Ok(key)
    }

    fn detach(&mut self, key: NodeKey) -> Result<(), RepositoryError> {
        if let Some(parent) = self.data(key)?.parent {
            self.data_mut(parent)?.children.retain(|child| *child != key);
        }
        Ok(())
    }

    fn drop_subtree(&mut self, key: NodeKey) {
        let mut pending = vec![key];
        while let Some(k) = pending.pop() {
            if let Some(data) = self.nodes.remove(&k) {
                pending.extend(data.children);
            }
        }
    }
}

fn protected(path: &ItemPath) -> RepositoryError {
    RepositoryError::InvalidOperation(format!("{} is protected", path))
}

fn dangling() -> RepositoryError {
    RepositoryError::InvalidOperation("tree references a missing node".to_string())
}
