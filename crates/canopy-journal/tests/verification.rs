use canopy_core::{ChangeRecord, CommitBatch, Event, EventType, ItemPath, Timestamp};
use canopy_journal::{verify_batch, JournalError};

fn make_batch(sequence: u64, millis: i64) -> CommitBatch {
    let ts = Timestamp::from_millis(millis);
    CommitBatch {
        sequence,
        workspace: "default".to_string(),
        timestamp: ts,
        events: vec![
            ChangeRecord::new(EventType::NodeAdded, ItemPath::parse("/a").unwrap())
                .into_event(ts, "admin", None),
            Event::persist(ts, "admin", None),
        ],
    }
}

#[test]
fn test_verify_batch_valid_chain() {
    let first = make_batch(1, 100);
    let second = make_batch(2, 100);
    assert!(verify_batch(&first, None).is_ok());
    assert!(verify_batch(&second, Some(&first)).is_ok());
}

#[test]
fn test_verify_batch_rejects_bad_first_sequence() {
    let err = verify_batch(&make_batch(3, 100), None).unwrap_err();
    assert!(matches!(err, JournalError::InvalidBatch { sequence: 3, .. }));
}

#[test]
fn test_verify_batch_rejects_gap_and_time_travel() {
    let first = make_batch(1, 100);
    assert!(verify_batch(&make_batch(3, 100), Some(&first)).is_err());
    assert!(verify_batch(&make_batch(2, 99), Some(&first)).is_err());
}

#[test]
fn test_verify_batch_rejects_workspace_switch() {
    let first = make_batch(1, 100);
    let mut second = make_batch(2, 100);
    second.workspace = "other".to_string();
    assert!(verify_batch(&second, Some(&first)).is_err());
}

#[test]
fn test_verify_batch_rejects_missing_persist() {
    let mut batch = make_batch(1, 100);
    batch.events.pop();
    let err = verify_batch(&batch, None).unwrap_err();
    assert!(err.to_string().contains("PERSIST"));
}
