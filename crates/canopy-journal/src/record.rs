use crate::errors::JournalError;
use canopy_core::CommitBatch;

/// Encodes a commit batch as the payload of a `CommitBatch` frame.
pub fn encode_batch(batch: &CommitBatch) -> Result<Vec<u8>, JournalError> {
    Ok(serde_json::to_vec(batch)?)
}

/// Decodes a `CommitBatch` frame payload.
///
/// Only the JSON shape is checked here; commit framing rules are enforced by
/// [`verify_batch`](crate::verify_batch).
pub fn decode_batch(payload: &[u8]) -> Result<CommitBatch, JournalError> {
    let text = std::str::from_utf8(payload)?;
    Ok(serde_json::from_str(text)?)
}
