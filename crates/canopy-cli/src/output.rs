//! Output formatting utilities.

use canopy_core::Event;
use canopy_store::CommitView;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Formats an event as a simple table row.
pub fn format_table_row(event: &Event) -> String {
    format!(
        "{:<24} {:<17} {:<40} {}",
        event.date().to_rfc3339(),
        event.event_type().as_str(),
        truncate(event.path(), 40),
        event.user_id()
    )
}

/// Prints the event table header.
#[allow(clippy::print_literal)]
pub fn print_table_header() {
    println!(
        "{:<24} {:<17} {:<40} {}",
        "DATE", "TYPE", "PATH", "USER"
    );
    println!("{}", "-".repeat(100));
}

/// JSON summary of one commit.
pub fn commit_json(sequence: usize, view: &CommitView) -> Value {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for event in &view.changes {
        *counts.entry(event.event_type().as_str()).or_insert(0) += 1;
    }
    json!({
        "commit": sequence,
        "date": view.timestamp.to_rfc3339(),
        "user_id": view.user_id,
        "user_data": view.user_data,
        "changes": view.changes.len(),
        "by_type": counts,
    })
}

/// Formats a commit as a table row.
pub fn format_commit_row(sequence: usize, view: &CommitView) -> String {
    format!(
        "{:<8} {:<24} {:<16} {:<8} {}",
        sequence,
        view.timestamp.to_rfc3339(),
        truncate(&view.user_id, 16),
        view.changes.len(),
        view.user_data.as_deref().unwrap_or("-")
    )
}

/// Prints the commit table header.
#[allow(clippy::print_literal)]
pub fn print_commit_header() {
    println!(
        "{:<8} {:<24} {:<16} {:<8} {}",
        "COMMIT", "DATE", "USER", "CHANGES", "USER_DATA"
    );
    println!("{}", "-".repeat(80));
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("/a", 10), "/a");
        assert_eq!(truncate("/abcdefghij", 8), "/abcd...");
    }
}
