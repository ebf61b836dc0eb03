//! Repository: the set of workspaces and their storage.

use crate::clock::{Clock, SystemClock};
use crate::config::RepositoryConfig;
use crate::error::RepositoryError;
use crate::session::Session;
use crate::workspace::Workspace;
use canopy_core::WorkspaceName;
use canopy_store::{DurableOptions, DurableStore, EventStore, MemoryStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Extension of per-workspace journal files.
pub const JOURNAL_EXTENSION: &str = "cnj";

/// A content repository holding named workspaces.
pub struct Repository {
    config: RepositoryConfig,
    clock: Arc<dyn Clock>,
    workspaces: RwLock<BTreeMap<String, Arc<Workspace>>>,
}

impl Repository {
    /// Opens a repository with the system clock.
    pub fn open(config: RepositoryConfig) -> Result<Self, RepositoryError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Opens a repository that stamps commits with `clock`.
    ///
    /// With a journal directory, each configured workspace replays its
    /// journal file; the tree itself always starts empty.
    pub fn with_clock(config: RepositoryConfig, clock: Arc<dyn Clock>) -> Result<Self, RepositoryError> {
        if let Some(dir) = &config.journal_dir {
            fs::create_dir_all(dir)?;
        }
        let repository = Self {
            workspaces: RwLock::new(BTreeMap::new()),
            clock,
            config,
        };
        for name in repository.config.workspaces.clone() {
            repository.create_workspace(&name)?;
        }
        info!(
            workspaces = repository.workspaces.read().len(),
            durable = repository.config.journal_dir.is_some(),
            "repository opened"
        );
        Ok(repository)
    }

    /// Configuration the repository was opened with.
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Path of the journal file for `workspace`, if the repository is durable.
    pub fn journal_path(&self, workspace: &str) -> Option<PathBuf> {
        self.config
            .journal_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", workspace, JOURNAL_EXTENSION)))
    }

    /// Creates a workspace, replaying its journal when one exists.
    pub fn create_workspace(&self, name: &str) -> Result<Arc<Workspace>, RepositoryError> {
        let name = WorkspaceName::parse(name)?;
        if self.workspaces.read().contains_key(name.as_str()) {
            return Err(RepositoryError::WorkspaceExists(name.to_string()));
        }

        let store: Arc<dyn EventStore> = match self.journal_path(name.as_str()) {
            Some(path) => {
                let options = DurableOptions {
                    write: self.config.write_options(),
                    read_mode: self.config.read_mode,
                };
                Arc::new(DurableStore::open(path, name.as_str(), options)?)
            }
            None => Arc::new(MemoryStore::new(name.as_str())),
        };
        let workspace = Arc::new(Workspace::new(
            name.clone(),
            store,
            Arc::clone(&self.clock),
            self.config.cursor_page_size,
        )?);

        let mut workspaces = self.workspaces.write();
        if workspaces.contains_key(name.as_str()) {
            return Err(RepositoryError::WorkspaceExists(name.to_string()));
        }
        workspaces.insert(name.to_string(), Arc::clone(&workspace));
        Ok(workspace)
    }

    /// Workspace called `name`.
    pub fn workspace(&self, name: &str) -> Result<Arc<Workspace>, RepositoryError> {
        self.workspaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RepositoryError::WorkspaceNotFound(name.to_string()))
    }

    /// Names of all workspaces, sorted.
    pub fn workspace_names(&self) -> Vec<String> {
        self.workspaces.read().keys().cloned().collect()
    }

    /// Opens a session for `user_id` on `workspace`.
    pub fn login(&self, user_id: &str, workspace: &str) -> Result<Session, RepositoryError> {
        Ok(Session::new(user_id, self.workspace(workspace)?))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("config", &self.config)
            .field("workspaces", &self.workspace_names())
            .finish()
    }
}
