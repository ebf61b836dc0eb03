//! Verify command implementation.

use crate::error::CliError;
use crate::output::truncate;
use crate::path;
use canopy_core::CommitBatch;
use canopy_journal::{verify_batch, JournalReader, ReadMode};
use serde_json::json;

struct BatchResult {
    sequence: u64,
    events: usize,
    timestamp: String,
    error: Option<String>,
}

pub fn run(journal: String, strict: bool, json_output: bool) -> Result<(), CliError> {
    let journal_path = path::validate_journal_path(&journal)?;
    let journal_error = |source| CliError::Journal {
        path: path::sanitize_path_for_error(&journal_path),
        source,
    };

    // Permissive reads stop at a damaged tail; it is reported below.
    let mut reader = JournalReader::open(&journal_path, ReadMode::Permissive).map_err(journal_error)?;

    let mut results = Vec::new();
    let mut previous: Option<CommitBatch> = None;
    while let Some(batch) = reader.read_batch().map_err(journal_error)? {
        let error = verify_batch(&batch, previous.as_ref())
            .err()
            .map(|e| e.to_string());
        results.push(BatchResult {
            sequence: batch.sequence,
            events: batch.events.len(),
            timestamp: batch.timestamp.to_rfc3339(),
            error,
        });
        previous = Some(batch);
    }

    let tail = reader.damage().map(|damage| {
        let kind = if reader.has_torn_tail() {
            "torn tail"
        } else {
            "corrupt frame"
        };
        format!(
            "{}: {} of {} bytes after offset {} ({})",
            kind,
            reader.file_len() - reader.committed_offset(),
            reader.file_len(),
            reader.committed_offset(),
            damage
        )
    });
    let failures = results.iter().filter(|r| r.error.is_some()).count() + usize::from(tail.is_some());

    if json_output {
        let batches: Vec<_> = results
            .iter()
            .map(|r| {
                json!({
                    "sequence": r.sequence,
                    "events": r.events,
                    "date": r.timestamp,
                    "verdict": if r.error.is_some() { "Invalid" } else { "Ok" },
                    "error": r.error,
                })
            })
            .collect();
        let report = json!({
            "batches": batches,
            "tail": tail,
            "ok": failures == 0,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{:<10} {:<8} {:<26} {}", "SEQUENCE", "EVENTS", "DATE", "VERDICT");
        println!("{}", "-".repeat(70));
        for r in &results {
            let verdict = match &r.error {
                Some(e) => format!("Invalid: {}", truncate(e, 60)),
                None => "Ok".to_string(),
            };
            println!("{:<10} {:<8} {:<26} {}", r.sequence, r.events, r.timestamp, verdict);
        }
        if let Some(tail) = &tail {
            eprintln!("Warning: {}", tail);
        }
    }

    if strict && failures > 0 {
        return Err(CliError::VerificationFailed(failures));
    }

    Ok(())
}
