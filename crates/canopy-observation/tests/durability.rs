use canopy_core::{EventType, Timestamp};
use canopy_observation::{JournalQuery, ManualClock, Repository, RepositoryConfig, RepositoryError};
use canopy_store::ReadMode;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn open(config: RepositoryConfig) -> Result<Repository, RepositoryError> {
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(5_000)));
    Repository::with_clock(config, clock)
}

fn node_paths(repo: &Repository) -> Vec<String> {
    let session = repo.login("reader", "default").unwrap();
    let mut journal = session
        .observation_manager()
        .get_event_journal(JournalQuery::new().event_types(EventType::NodeAdded))
        .unwrap();
    journal.events().map(|e| e.path().to_string()).collect()
}

#[test]
fn test_journal_replays_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = RepositoryConfig::durable(temp_dir.path());

    {
        let repo = open(config.clone()).unwrap();
        let mut session = repo.login("admin", "default").unwrap();
        session.add_node("/a", None).unwrap();
        session.save().unwrap();
        session.add_node("/b", None).unwrap();
        session.save().unwrap();
    }

    let repo = open(config).unwrap();
    assert_eq!(node_paths(&repo), vec!["/a", "/b"]);

    // The journal keeps growing from where it stopped.
    let mut session = repo.login("admin", "default").unwrap();
    session.add_node("/c", None).unwrap();
    let receipt = session.save().unwrap().unwrap();
    assert_eq!(receipt.sequence, 3);
    assert_eq!(node_paths(&repo), vec!["/a", "/b", "/c"]);
}

#[test]
fn test_workspaces_have_separate_journals() {
    let temp_dir = TempDir::new().unwrap();
    let config = RepositoryConfig {
        workspaces: vec!["default".to_string(), "staging".to_string()],
        ..RepositoryConfig::durable(temp_dir.path())
    };
    let repo = open(config).unwrap();

    let mut staging = repo.login("admin", "staging").unwrap();
    staging.add_node("/draft", None).unwrap();
    staging.save().unwrap();

    assert!(node_paths(&repo).is_empty());
    assert!(temp_dir.path().join("default.cnj").exists());
    assert!(temp_dir.path().join("staging.cnj").exists());
}

#[test]
fn test_torn_commit_handling_follows_read_mode() {
    let temp_dir = TempDir::new().unwrap();
    let config = RepositoryConfig::durable(temp_dir.path());

    {
        let repo = open(config.clone()).unwrap();
        let mut session = repo.login("admin", "default").unwrap();
        session.add_node("/kept", None).unwrap();
        session.save().unwrap();
        session.add_node("/torn", None).unwrap();
        session.save().unwrap();
    }
    let path = temp_dir.path().join("default.cnj");
    let len = fs::metadata(&path).unwrap().len();
    fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    assert!(matches!(
        open(config.clone()),
        Err(RepositoryError::Store(_))
    ));

    let permissive = RepositoryConfig {
        read_mode: ReadMode::Permissive,
        ..config
    };
    let repo = open(permissive).unwrap();
    assert_eq!(node_paths(&repo), vec!["/kept"]);
}

#[test]
fn test_config_file_drives_repository() {
    let temp_dir = TempDir::new().unwrap();
    let journal_dir = temp_dir.path().join("journals");
    let config_path = temp_dir.path().join("canopy.json");
    fs::write(
        &config_path,
        serde_json::json!({
            "journal_dir": journal_dir,
            "sync": true,
            "workspaces": ["main"],
        })
        .to_string(),
    )
    .unwrap();

    let config = RepositoryConfig::from_file(&config_path).unwrap();
    assert!(config.write_options().sync);
    let repo = open(config).unwrap();
    assert_eq!(repo.workspace_names(), vec!["main".to_string()]);
    assert!(journal_dir.join("main.cnj").exists());
}
