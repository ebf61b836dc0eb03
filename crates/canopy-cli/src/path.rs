//! Journal path handling.

use crate::error::CliError;
use std::path::{Path, PathBuf};

/// Checks that `journal` names an existing regular file.
pub fn validate_journal_path(journal: &str) -> Result<PathBuf, CliError> {
    if journal.trim().is_empty() {
        return Err(CliError::InvalidPath("path is empty".to_string()));
    }
    let path = PathBuf::from(journal);
    let metadata = std::fs::metadata(&path)
        .map_err(|e| CliError::InvalidPath(format!("{}: {}", sanitize_path_for_error(&path), e)))?;
    if !metadata.is_file() {
        return Err(CliError::InvalidPath(format!(
            "{} is not a file",
            sanitize_path_for_error(&path)
        )));
    }
    Ok(path)
}

/// File name only, so error messages do not leak directory layout.
pub fn sanitize_path_for_error(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<journal>".to_string())
}

/// Workspace name implied by a journal file: its stem.
pub fn workspace_from_path(path: &Path) -> Result<String, CliError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| CliError::InvalidPath("cannot derive workspace from file name".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_is_file_stem() {
        let path = Path::new("/var/lib/canopy/default.cnj");
        assert_eq!(workspace_from_path(path).unwrap(), "default");
        assert_eq!(sanitize_path_for_error(path), "default.cnj");
    }

    #[test]
    fn directories_and_missing_files_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(validate_journal_path(dir.path().to_str().unwrap()).is_err());
        assert!(validate_journal_path(dir.path().join("none.cnj").to_str().unwrap()).is_err());
        assert!(validate_journal_path("").is_err());
    }
}
