use crate::errors::JournalError;

/// Journal file magic bytes: `b"CNJ1"`.
pub const MAGIC: &[u8; 4] = b"CNJ1";

/// Current journal format version: `0x0001`.
pub const VERSION: u16 = 0x0001;

/// Header size in bytes: 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Frame header size in bytes: kind, 3 reserved bytes, length, CRC32.
pub const FRAME_HEADER_SIZE: usize = 12;

/// Maximum recommended payload size: 16 MiB.
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Record frame kind: one JSON-encoded commit batch.
pub const FRAME_KIND_COMMIT_BATCH: u8 = 0x01;

/// Journal file header (16 bytes).
///
/// ```text
/// 0..4   magic "CNJ1"
/// 4..6   version (LE)
/// 6..8   flags, must be 0
/// 8..16  reserved, must be 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalHeader {
    /// Format version.
    pub version: u16,
    /// Reserved flags (must be 0).
    pub flags: u16,
}

impl JournalHeader {
    /// Header size constant.
    pub const HEADER_SIZE: usize = HEADER_SIZE;

    /// Creates a header for the current format version.
    pub fn new() -> Self {
        Self {
            version: VERSION,
            flags: 0,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.flags.to_le_bytes());
        bytes
    }

    /// Deserializes and validates a header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, JournalError> {
        if bytes.len() < HEADER_SIZE {
            return Err(JournalError::InvalidHeader(format!(
                "header too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(JournalError::InvalidHeader(format!(
                "invalid magic: {:?}, expected {:?}",
                &bytes[0..4],
                MAGIC
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(JournalError::InvalidHeader(format!(
                "unsupported version: 0x{:04x}, expected 0x{:04x}",
                version, VERSION
            )));
        }

        let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
        if flags != 0 {
            return Err(JournalError::InvalidHeader(format!(
                "non-zero flags: 0x{:04x}",
                flags
            )));
        }
        if bytes[8..HEADER_SIZE].iter().any(|b| *b != 0) {
            return Err(JournalError::InvalidHeader(
                "non-zero reserved bytes".to_string(),
            ));
        }

        Ok(Self { version, flags })
    }
}

impl Default for JournalHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Record frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// CommitBatch: UTF-8 JSON object holding one commit's events.
    CommitBatch,
    /// Unknown/unsupported frame kind; readers skip these.
    Unknown(u8),
}

impl FrameKind {
    /// Creates a FrameKind from a byte value.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            FRAME_KIND_COMMIT_BATCH => FrameKind::CommitBatch,
            _ => FrameKind::Unknown(byte),
        }
    }

    /// Returns the byte value for this kind.
    pub fn to_byte(self) -> u8 {
        match self {
            FrameKind::CommitBatch => FRAME_KIND_COMMIT_BATCH,
            FrameKind::Unknown(b) => b,
        }
    }
}

/// Record frame header (12 bytes) preceding every payload.
///
/// ```text
/// 0      kind
/// 1..4   reserved, must be 0
/// 4..8   payload length (LE)
/// 8..12  CRC32 of the payload (LE)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFrame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Payload length in bytes.
    pub len: u32,
    /// CRC32 of the payload bytes.
    pub checksum: u32,
}

impl RecordFrame {
    /// Frame header size constant.
    pub const FRAME_HEADER_SIZE: usize = FRAME_HEADER_SIZE;

    /// Builds the frame header for `payload`.
    pub fn for_payload(kind: FrameKind, payload: &[u8]) -> Result<Self, JournalError> {
        let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        if len > MAX_PAYLOAD_SIZE {
            return Err(JournalError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            kind,
            len,
            checksum: crc32fast::hash(payload),
        })
    }

    /// Serializes the frame header to bytes.
    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut bytes = [0u8; FRAME_HEADER_SIZE];
        bytes[0] = self.kind.to_byte();
        bytes[4..8].copy_from_slice(&self.len.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserializes a frame header found at `offset`.
    pub fn from_bytes(bytes: &[u8], offset: u64) -> Result<Self, JournalError> {
        let invalid = |reason: String| JournalError::InvalidFrame { offset, reason };
        if bytes.len() < FRAME_HEADER_SIZE {
            return Err(invalid(format!(
                "frame header too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[1..4] != [0u8; 3] {
            return Err(invalid("non-zero reserved bytes".to_string()));
        }

        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if len > MAX_PAYLOAD_SIZE {
            return Err(invalid(format!(
                "payload size {} exceeds maximum {}",
                len, MAX_PAYLOAD_SIZE
            )));
        }
        let checksum = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        Ok(Self {
            kind: FrameKind::from_byte(bytes[0]),
            len,
            checksum,
        })
    }

    /// True if `payload` hashes to the recorded checksum.
    pub fn matches(&self, payload: &[u8]) -> bool {
        crc32fast::hash(payload) == self.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = JournalHeader::new();
        let restored = JournalHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(header, restored);
    }

    #[test]
    fn header_rejects_foreign_magic() {
        let mut bytes = JournalHeader::new().to_bytes();
        bytes[0..4].copy_from_slice(b"NRJ1");
        assert!(JournalHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn header_rejects_invalid_version() {
        let mut bytes = JournalHeader::new().to_bytes();
        bytes[4] = 0x02;
        let err = JournalHeader::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn header_rejects_non_zero_flags_and_reserved() {
        let mut bytes = JournalHeader::new().to_bytes();
        bytes[6] = 0x01;
        assert!(JournalHeader::from_bytes(&bytes).is_err());

        let mut bytes = JournalHeader::new().to_bytes();
        bytes[12] = 0x01;
        assert!(JournalHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn frame_carries_length_and_checksum() {
        let payload = br#"{"sequence":1}"#;
        let frame = RecordFrame::for_payload(FrameKind::CommitBatch, payload).unwrap();
        let restored = RecordFrame::from_bytes(&frame.to_bytes(), 16).unwrap();
        assert_eq!(restored, frame);
        assert_eq!(restored.len as usize, payload.len());
        assert!(restored.matches(payload));
        assert!(!restored.matches(br#"{"sequence":2}"#));
    }

    #[test]
    fn frame_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE as usize + 1];
        assert!(RecordFrame::for_payload(FrameKind::CommitBatch, &payload).is_err());
    }

    #[test]
    fn frame_reports_offset_of_bad_reserved_bytes() {
        let mut bytes = RecordFrame::for_payload(FrameKind::CommitBatch, b"{}")
            .unwrap()
            .to_bytes();
        bytes[1] = 0x01;
        match RecordFrame::from_bytes(&bytes, 40) {
            Err(JournalError::InvalidFrame { offset, .. }) => assert_eq!(offset, 40),
            other => panic!("expected InvalidFrame, got {:?}", other),
        }
    }

    #[test]
    fn frame_kind_unknown() {
        let kind = FrameKind::from_byte(0xFF);
        assert_eq!(kind, FrameKind::Unknown(0xFF));
        assert_eq!(kind.to_byte(), 0xFF);
    }
}
