use canopy_core::{ChangeRecord, CommitBatch, Event, EventType, ItemPath, Timestamp};
use canopy_journal::frame::MAX_PAYLOAD_SIZE;
use canopy_journal::{
    FrameKind, JournalError, JournalReader, JournalWriter, ReadMode, RecordFrame, WriteOptions,
};
use std::fs;
use std::io::{Seek, Write};
use tempfile::TempDir;

fn make_batch(sequence: u64, node: &str) -> CommitBatch {
    let ts = Timestamp::from_millis(1_700_000_000_000 + sequence as i64);
    CommitBatch {
        sequence,
        workspace: "default".to_string(),
        timestamp: ts,
        events: vec![
            ChangeRecord::new(EventType::NodeAdded, ItemPath::parse(node).unwrap())
                .into_event(ts, "admin", None),
            Event::persist(ts, "admin", None),
        ],
    }
}

fn write_batches(path: &std::path::Path, count: u64) {
    let mut writer = JournalWriter::open(path, WriteOptions::default()).unwrap();
    for seq in 1..=count {
        writer
            .append_batch(&make_batch(seq, &format!("/n{}", seq)))
            .unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn test_payload_size_limit() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");

    let oversized_payload = vec![0u8; MAX_PAYLOAD_SIZE as usize + 1];

    let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
    let result = writer.append_raw(FrameKind::CommitBatch, &oversized_payload);

    match result.unwrap_err() {
        JournalError::PayloadTooLarge { size, max } => {
            assert_eq!(size, MAX_PAYLOAD_SIZE + 1);
            assert_eq!(max, MAX_PAYLOAD_SIZE);
        }
        other => panic!("Expected PayloadTooLarge error, got {:?}", other),
    }
    assert_eq!(writer.position(), 16);
}

#[test]
fn test_max_payload_size_allowed() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");

    let max_payload = vec![0u8; MAX_PAYLOAD_SIZE as usize];

    let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
    writer
        .append_raw(FrameKind::Unknown(0x7f), &max_payload)
        .unwrap();
    writer.finish().unwrap();

    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    let (kind, payload) = reader.read_frame().unwrap().unwrap();
    assert_eq!(kind, FrameKind::Unknown(0x7f));
    assert_eq!(payload.len(), MAX_PAYLOAD_SIZE as usize);
}

#[test]
fn test_reserved_bytes_must_be_zero() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");
    write_batches(&journal_path, 1);

    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&journal_path)
        .unwrap();
    // First reserved byte of the first frame header.
    file.seek(std::io::SeekFrom::Start(16 + 1)).unwrap();
    file.write_all(&[0x01]).unwrap();
    drop(file);

    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    assert!(reader.read_frame().is_err());
}

#[test]
fn test_header_reserved_bytes_must_be_zero() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");
    write_batches(&journal_path, 1);

    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&journal_path)
        .unwrap();
    file.seek(std::io::SeekFrom::Start(8)).unwrap();
    file.write_all(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08])
        .unwrap();
    drop(file);

    assert!(JournalReader::open(&journal_path, ReadMode::Strict).is_err());
}

#[test]
fn test_corrupted_payload_fails_checksum() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");
    write_batches(&journal_path, 2);

    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    reader.read_batch().unwrap().unwrap();
    let second_frame = reader.position();
    drop(reader);

    // Flip a byte inside the second payload.
    let mut file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&journal_path)
        .unwrap();
    file.seek(std::io::SeekFrom::Start(
        second_frame + RecordFrame::FRAME_HEADER_SIZE as u64 + 2,
    ))
    .unwrap();
    file.write_all(b"#").unwrap();
    drop(file);

    {
        let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
        assert_eq!(reader.read_batch().unwrap().unwrap().sequence, 1);
        match reader.read_batch() {
            Err(JournalError::InvalidFrame { offset, reason }) => {
                assert_eq!(offset, second_frame);
                assert!(reason.contains("checksum"));
            }
            other => panic!("expected checksum failure, got {:?}", other),
        }
    }
    {
        let mut reader = JournalReader::open(&journal_path, ReadMode::Permissive).unwrap();
        assert_eq!(reader.read_batch().unwrap().unwrap().sequence, 1);
        assert!(reader.read_batch().unwrap().is_none());
        assert_eq!(reader.committed_offset(), second_frame);
        assert!(!reader.has_torn_tail());
        assert!(matches!(
            reader.damage(),
            Some(JournalError::InvalidFrame { offset, .. }) if *offset == second_frame
        ));
    }
}

#[test]
fn test_partial_write_handling() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");
    write_batches(&journal_path, 2);

    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    assert_eq!(reader.read_batch().unwrap().unwrap().sequence, 1);
    let first_batch_end = reader.position();
    drop(reader);

    let file = fs::OpenOptions::new()
        .write(true)
        .open(&journal_path)
        .unwrap();
    file.set_len(first_batch_end + 10).unwrap();
    drop(file);

    {
        let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
        assert!(reader.read_batch().unwrap().is_some());
        assert!(reader.read_batch().is_err());
    }
    {
        let mut reader = JournalReader::open(&journal_path, ReadMode::Permissive).unwrap();
        assert!(reader.read_batch().unwrap().is_some());
        assert!(reader.read_batch().unwrap().is_none());
        assert_eq!(reader.committed_offset(), first_batch_end);
        assert!(reader.has_torn_tail());
    }
}

#[test]
fn test_append_after_failed_append_lands_at_position() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");

    let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
    writer.append_batch(&make_batch(1, "/a")).unwrap();
    let committed = writer.position();

    let oversized = vec![0u8; MAX_PAYLOAD_SIZE as usize + 1];
    assert!(writer.append_raw(FrameKind::CommitBatch, &oversized).is_err());
    writer.truncate_to(committed).unwrap();
    writer.append_batch(&make_batch(2, "/b")).unwrap();
    writer.finish().unwrap();

    let reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    let sequences: Vec<u64> = reader.map(|b| b.unwrap().sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[test]
fn test_truncate_to_drops_torn_tail() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");
    write_batches(&journal_path, 1);

    let committed = fs::metadata(&journal_path).unwrap().len();
    {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&journal_path)
            .unwrap();
        file.write_all(&[0x01, 0x00, 0x00]).unwrap();
    }

    let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
    writer.truncate_to(committed).unwrap();
    writer.append_batch(&make_batch(2, "/after")).unwrap();
    writer.finish().unwrap();

    let reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    let sequences: Vec<u64> = reader.map(|b| b.unwrap().sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
}

#[test]
fn test_unknown_frame_kind_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let journal_path = temp_dir.path().join("default.cnj");
    write_batches(&journal_path, 1);

    {
        let mut writer = JournalWriter::open(&journal_path, WriteOptions::default()).unwrap();
        writer
            .append_raw(FrameKind::Unknown(0xFF), b"unknown123")
            .unwrap();
    }

    let mut reader = JournalReader::open(&journal_path, ReadMode::Strict).unwrap();
    assert_eq!(reader.read_batch().unwrap().unwrap().sequence, 1);
    assert!(reader.read_batch().unwrap().is_none());
}
