//! Repository configuration.

use crate::error::RepositoryError;
use canopy_store::{ReadMode, WriteOptions, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for opening a [`Repository`](crate::Repository).
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```json
/// { "journal_dir": "/var/lib/canopy", "sync": true }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory holding one `<workspace>.cnj` journal per workspace.
    /// `None` keeps journals in memory.
    pub journal_dir: Option<PathBuf>,
    /// Fsync the journal after every commit.
    pub sync: bool,
    /// How a damaged journal tail is treated on open.
    pub read_mode: ReadMode,
    /// Workspaces created on open.
    pub workspaces: Vec<String>,
    /// Raw events fetched per cursor read.
    pub cursor_page_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            journal_dir: None,
            sync: false,
            read_mode: ReadMode::Strict,
            workspaces: vec!["default".to_string()],
            cursor_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RepositoryConfig {
    /// In-memory configuration with the default workspace.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Durable configuration writing journals below `dir`.
    pub fn durable(dir: impl Into<PathBuf>) -> Self {
        Self {
            journal_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Loads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| RepositoryError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Journal writer options derived from this config.
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            sync: self.sync,
            ..WriteOptions::default()
        }
    }
}
