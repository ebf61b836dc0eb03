//! List command implementation.

use crate::error::CliError;
use crate::output;
use crate::path;
use canopy_core::{EventTypeMask, ItemPath, NodeId, NodeTypeName, Timestamp};
use canopy_store::{load_journal, EventJournal, EventStore, JournalFilter, ReadMode};
use clap::Args;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Path to journal file
    pub journal: String,
    /// Workspace the journal belongs to (default: file stem)
    #[arg(long)]
    pub workspace: Option<String>,
    /// Comma separated event types, e.g. NODE_ADDED,PROPERTY_CHANGED
    #[arg(long)]
    pub types: Option<String>,
    /// Only events at this path
    #[arg(long)]
    pub path: Option<String>,
    /// With --path, include events below the path
    #[arg(long, requires = "path")]
    pub deep: bool,
    /// Only events whose parent node has this identifier (repeatable)
    #[arg(long = "identifier")]
    pub identifiers: Vec<String>,
    /// Only events recorded for this node type (repeatable)
    #[arg(long = "node-type")]
    pub node_types: Vec<String>,
    /// Start at this time (RFC 3339 or epoch milliseconds)
    #[arg(long)]
    pub since: Option<String>,
    /// Keep PERSIST markers in filtered output
    #[arg(long)]
    pub commit_markers: bool,
    /// Drop a damaged journal tail instead of failing
    #[arg(long)]
    pub permissive: bool,
    /// Output as JSON lines
    #[arg(long)]
    pub json: bool,
    /// Stop after N events (default: unlimited)
    #[arg(long)]
    pub max_events: Option<u64>,
}

impl ListArgs {
    fn filter(&self) -> Result<JournalFilter, CliError> {
        let mut filter = JournalFilter::new().keep_commit_markers(self.commit_markers);
        if let Some(types) = &self.types {
            let mask =
                EventTypeMask::parse_list(types).map_err(|e| CliError::argument("--types", e))?;
            filter = filter.event_types(mask);
        }
        if let Some(path) = &self.path {
            let path = ItemPath::parse(path.as_str()).map_err(|e| CliError::argument("--path", e))?;
            filter = filter.path(path, self.deep);
        }
        if !self.identifiers.is_empty() {
            let identifiers = self
                .identifiers
                .iter()
                .map(|id| id.parse::<NodeId>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CliError::argument("--identifier", e))?;
            filter = filter.identifiers(identifiers);
        }
        if !self.node_types.is_empty() {
            let node_types = self
                .node_types
                .iter()
                .map(|t| NodeTypeName::parse(t.as_str()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CliError::argument("--node-type", e))?;
            filter = filter.node_types(node_types);
        }
        Ok(filter)
    }
}

pub fn run(args: ListArgs) -> Result<(), CliError> {
    let journal_path = path::validate_journal_path(&args.journal)?;
    let workspace = match &args.workspace {
        Some(name) => name.clone(),
        None => path::workspace_from_path(&journal_path)?,
    };
    let filter = args.filter()?;
    let since = args
        .since
        .as_deref()
        .map(Timestamp::parse)
        .transpose()
        .map_err(|e| CliError::argument("--since", e))?
        .unwrap_or(Timestamp::MIN);
    let mode = if args.permissive {
        ReadMode::Permissive
    } else {
        ReadMode::Strict
    };

    let loaded = load_journal(&journal_path, &workspace, mode).map_err(|source| CliError::Store {
        path: path::sanitize_path_for_error(&journal_path),
        source,
    })?;
    if loaded.committed_offset < loaded.file_len {
        tracing::warn!(
            committed = loaded.committed_offset,
            file_len = loaded.file_len,
            "ignoring damaged journal tail"
        );
    }

    let mut journal = EventJournal::new(loaded.index.source(), filter);
    journal.skip_to(since);

    if !args.json {
        output::print_table_header();
    }

    let mut event_count: u64 = 0;
    while journal.valid() {
        if let Some(max) = args.max_events {
            if event_count >= max {
                break;
            }
        }
        let event = journal.current().map_err(|source| CliError::Store {
            path: path::sanitize_path_for_error(&journal_path),
            source,
        })?;
        if args.json {
            println!("{}", serde_json::to_string(event)?);
        } else {
            println!("{}", output::format_table_row(event));
        }
        event_count += 1;
        journal.next();
    }

    Ok(())
}
