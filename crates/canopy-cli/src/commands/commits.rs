//! Commits command implementation.

use crate::error::CliError;
use crate::output;
use crate::path;
use canopy_store::{commits, load_journal, EventJournal, EventStore, JournalFilter, ReadMode};

pub fn run(journal: String, workspace: Option<String>, json: bool) -> Result<(), CliError> {
    let journal_path = path::validate_journal_path(&journal)?;
    let workspace = match workspace {
        Some(name) => name,
        None => path::workspace_from_path(&journal_path)?,
    };

    let loaded = load_journal(&journal_path, &workspace, ReadMode::Strict).map_err(|source| {
        CliError::Store {
            path: path::sanitize_path_for_error(&journal_path),
            source,
        }
    })?;

    let filter = JournalFilter::new().keep_commit_markers(true);
    let mut journal = EventJournal::new(loaded.index.source(), filter);
    let views = commits(&mut journal);

    if json {
        let summary: Vec<_> = views
            .iter()
            .enumerate()
            .map(|(i, view)| output::commit_json(i + 1, view))
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        output::print_commit_header();
        for (i, view) in views.iter().enumerate() {
            println!("{}", output::format_commit_row(i + 1, view));
        }
    }

    Ok(())
}
