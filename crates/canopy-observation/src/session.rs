//! Sessions: one actor's view of a workspace with pending changes.

use crate::error::RepositoryError;
use crate::manager::ObservationManager;
use crate::tree::{PropertyValue, Tree, TreeOp, MIX_REFERENCEABLE, NT_UNSTRUCTURED};
use crate::workspace::Workspace;
use canopy_core::{ItemPath, NodeId, NodeTypeName};
use canopy_store::CommitReceipt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Unique identifier of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// State shared between a session and its observation manager.
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) id: SessionId,
    pub(crate) user_data: Mutex<Option<String>>,
    pub(crate) live: AtomicBool,
}

impl SessionShared {
    pub(crate) fn ensure_live(&self) -> Result<(), RepositoryError> {
        if self.live.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RepositoryError::SessionClosed)
        }
    }
}

/// A logged-in user working on one workspace.
///
/// Mutations apply to a private working copy immediately, so the session
/// reads its own writes, and are queued until [`save`](Self::save) replays
/// them against the shared tree as one commit.
pub struct Session {
    user_id: String,
    workspace: Arc<Workspace>,
    working: Tree,
    pending: Vec<TreeOp>,
    shared: Arc<SessionShared>,
}

impl Session {
    pub(crate) fn new(user_id: &str, workspace: Arc<Workspace>) -> Self {
        let working = Tree::clone(&workspace.snapshot());
        let shared = Arc::new(SessionShared {
            id: SessionId::generate(),
            user_data: Mutex::new(None),
            live: AtomicBool::new(true),
        });
        debug!(session = %shared.id, user = user_id, workspace = workspace.name(), "session opened");
        Self {
            user_id: user_id.to_string(),
            workspace,
            working,
            pending: Vec::new(),
            shared,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// User the session belongs to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Name of the session's workspace.
    pub fn workspace_name(&self) -> &str {
        self.workspace.name()
    }

    /// False once the session has been logged out.
    pub fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Observation manager bound to this session.
    pub fn observation_manager(&self) -> ObservationManager {
        ObservationManager::new(Arc::clone(&self.workspace), Arc::clone(&self.shared))
    }

    fn stage(&mut self, op: TreeOp) -> Result<(), RepositoryError> {
        self.shared.ensure_live()?;
        self.working.apply(&op, &mut ())?;
        self.pending.push(op);
        Ok(())
    }

    /// Adds a node at `path`. The primary type defaults to `nt:unstructured`.
    pub fn add_node(&mut self, path: &str, primary_type: Option<&str>) -> Result<(), RepositoryError> {
        let path = ItemPath::parse(path)?;
        let primary_type = NodeTypeName::parse(primary_type.unwrap_or(NT_UNSTRUCTURED))?;
        self.stage(TreeOp::AddNode { path, primary_type })
    }

    /// Adds or changes the property `name` of the node at `node`.
    pub fn set_property(
        &mut self,
        node: &str,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), RepositoryError> {
        self.stage(TreeOp::SetProperty {
            node: ItemPath::parse(node)?,
            name: name.to_string(),
            value: value.into(),
        })
    }

    /// Removes the property `name` of the node at `node`.
    pub fn remove_property(&mut self, node: &str, name: &str) -> Result<(), RepositoryError> {
        self.stage(TreeOp::RemoveProperty {
            node: ItemPath::parse(node)?,
            name: name.to_string(),
        })
    }

    /// Removes the node at `path` with its subtree.
    pub fn remove_node(&mut self, path: &str) -> Result<(), RepositoryError> {
        self.stage(TreeOp::RemoveNode {
            path: ItemPath::parse(path)?,
        })
    }

    /// Moves the node at `src` to `dest`.
    pub fn move_node(&mut self, src: &str, dest: &str) -> Result<(), RepositoryError> {
        self.stage(TreeOp::MoveNode {
            src: ItemPath::parse(src)?,
            dest: ItemPath::parse(dest)?,
        })
    }

    /// Adds a mixin to the node at `path`.
    ///
    /// Adding `mix:referenceable` assigns the node a fresh identifier.
    pub fn add_mixin(&mut self, path: &str, mixin: &str) -> Result<(), RepositoryError> {
        let path = ItemPath::parse(path)?;
        let mixin = NodeTypeName::parse(mixin)?;
        let identifier = NodeId::generate();
        self.stage(TreeOp::AddMixin {
            path,
            mixin,
            identifier,
        })
    }

    /// Makes the node at `path` referenceable and returns its identifier.
    pub fn make_referenceable(&mut self, path: &str) -> Result<NodeId, RepositoryError> {
        self.add_mixin(path, MIX_REFERENCEABLE)?;
        self.identifier(path)?
            .ok_or_else(|| RepositoryError::InvalidOperation(format!("{} has no identifier", path)))
    }

    /// Stages removal of every root child except `jcr:system`.
    pub fn purge_workspace(&mut self) -> Result<(), RepositoryError> {
        for op in self.working.purge_ops() {
            self.stage(op)?;
        }
        Ok(())
    }

    /// Identifier of the node at `path`, if it is referenceable.
    pub fn identifier(&self, path: &str) -> Result<Option<NodeId>, RepositoryError> {
        let path = ItemPath::parse(path)?;
        self.working
            .node(&path)
            .map(|node| node.identifier())
            .ok_or_else(|| RepositoryError::PathNotFound(path.to_string()))
    }

    /// The session's view of the tree, pending changes included.
    pub fn tree(&self) -> &Tree {
        &self.working
    }

    /// True if a node or property exists at `path` in the session's view.
    pub fn item_exists(&self, path: &str) -> Result<bool, RepositoryError> {
        Ok(self.working.item_exists(&ItemPath::parse(path)?))
    }

    /// True if changes are waiting for [`save`](Self::save).
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Commits pending changes.
    ///
    /// Returns `None` when nothing observable changed. On error the pending
    /// changes are kept so the caller can retry or [`refresh`](Self::refresh).
    pub fn save(&mut self) -> Result<Option<CommitReceipt>, RepositoryError> {
        self.shared.ensure_live()?;
        let user_data = self.shared.user_data.lock().clone();
        let outcome = self.workspace.commit(
            self.shared.id,
            &self.user_id,
            user_data.as_deref(),
            &self.pending,
        )?;
        self.pending.clear();
        self.working = Tree::clone(&outcome.tree);
        Ok(outcome.receipt)
    }

    /// Reloads the committed tree.
    ///
    /// With `keep_changes` the pending operations are replayed on top;
    /// any that no longer apply are dropped.
    pub fn refresh(&mut self, keep_changes: bool) -> Result<(), RepositoryError> {
        self.shared.ensure_live()?;
        self.working = Tree::clone(&self.workspace.snapshot());
        if !keep_changes {
            self.pending.clear();
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        for op in pending {
            match self.working.apply(&op, &mut ()) {
                Ok(()) => self.pending.push(op),
                Err(err) => warn!(session = %self.shared.id, error = %err, "dropping stale change"),
            }
        }
        Ok(())
    }

    /// Ends the session and deregisters its listeners. Idempotent.
    pub fn logout(&mut self) {
        if self.shared.live.swap(false, Ordering::AcqRel) {
            let removed = self.workspace.registry().unsubscribe_session(self.shared.id);
            self.pending.clear();
            debug!(session = %self.shared.id, listeners = removed, "session closed");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.logout();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.shared.id)
            .field("user_id", &self.user_id)
            .field("workspace", &self.workspace.name())
            .field("pending", &self.pending.len())
            .finish()
    }
}
