//! Verification helpers for journal batches.

use crate::errors::JournalError;
use canopy_core::CommitBatch;

/// Verifies a batch against its predecessor in the same journal.
///
/// Checks the commit framing rules, that sequence numbers start at 1 and
/// increase by one, that the workspace does not change and that timestamps
/// never go backwards.
pub fn verify_batch(
    batch: &CommitBatch,
    previous: Option<&CommitBatch>,
) -> Result<(), JournalError> {
    let invalid = |reason: String| JournalError::InvalidBatch {
        sequence: batch.sequence,
        reason,
    };

    batch.validate().map_err(|e| invalid(e.to_string()))?;

    match previous {
        None if batch.sequence != 1 => Err(invalid(format!(
            "first batch has sequence {}, expected 1",
            batch.sequence
        ))),
        None => Ok(()),
        Some(prev) => {
            if batch.sequence != prev.sequence + 1 {
                return Err(invalid(format!(
                    "sequence gap after {}",
                    prev.sequence
                )));
            }
            if batch.workspace != prev.workspace {
                return Err(invalid(format!(
                    "workspace changed from {} to {}",
                    prev.workspace, batch.workspace
                )));
            }
            if batch.timestamp < prev.timestamp {
                return Err(invalid(format!(
                    "timestamp {} precedes previous commit at {}",
                    batch.timestamp, prev.timestamp
                )));
            }
            Ok(())
        }
    }
}
