//! Log frame definitions
//!
//! Defines the structure of individual log frames.

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Frame header: seq (8) + len (4) + header crc (4) + body crc (4)
pub const HEADER_SIZE: usize = 20;

/// Bytes covered by the header checksum: seq + len
const HEADER_CHECKED: usize = 12;

/// Row mutations recorded in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOp {
    /// Insert or fully replace a row
    Upsert {
        key: String,
        tag: String,
        payload: Vec<u8>,
    },

    /// Remove a row
    Delete { key: String },
}

/// A single frame in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Sequence number - monotonically increasing
    pub seq: u64,

    /// The mutation to replay
    pub op: LogOp,
}

/// Outcome of reading one frame from a byte slice
#[derive(Debug)]
pub enum FrameRead {
    /// A valid frame and the number of bytes it occupied
    Entry(LogEntry, usize),

    /// Valid header, but the body runs past the end of the bytes
    Incomplete,

    /// Header checksum mismatch; the length field cannot be trusted
    BadHeader { reason: String },

    /// Valid header whose body failed validation; `len` bytes can be skipped
    Corrupt { len: usize, reason: String },
}

impl LogEntry {
    pub fn new(seq: u64, op: LogOp) -> Self {
        Self { seq, op }
    }

    /// Serialize to header + body
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(&self.op)
            .map_err(|e| KvError::Serialization(format!("log frame body: {}", e)))?;
        let body_len = u32::try_from(body.len()).map_err(|_| {
            KvError::Serialization(format!(
                "log frame body of {} bytes exceeds the u32 length field",
                body.len()
            ))
        })?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + body.len());
        frame.extend_from_slice(&self.seq.to_le_bytes());
        frame.extend_from_slice(&body_len.to_le_bytes());
        let header_crc = crc32fast::hash(&frame[..HEADER_CHECKED]);
        frame.extend_from_slice(&header_crc.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Deserialize exactly one frame from the start of `bytes`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        match decode_frame(bytes) {
            FrameRead::Entry(entry, _) => Ok(entry),
            FrameRead::Incomplete => Err(KvError::LogCorruption(format!(
                "incomplete frame ({} bytes)",
                bytes.len()
            ))),
            FrameRead::BadHeader { reason } | FrameRead::Corrupt { reason, .. } => {
                Err(KvError::LogCorruption(reason))
            }
        }
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

/// Read the frame at the start of `bytes`
pub fn decode_frame(bytes: &[u8]) -> FrameRead {
    if bytes.len() < HEADER_SIZE {
        return FrameRead::Incomplete;
    }

    // Step 1: Trust nothing in the header until its checksum matches
    let expected_header_crc = read_u32(bytes, 12);
    let actual_header_crc = crc32fast::hash(&bytes[..HEADER_CHECKED]);
    if actual_header_crc != expected_header_crc {
        return FrameRead::BadHeader {
            reason: format!(
                "header CRC mismatch: expected {:08x}, got {:08x}",
                expected_header_crc, actual_header_crc
            ),
        };
    }

    let mut seq = [0u8; 8];
    seq.copy_from_slice(&bytes[0..8]);
    let seq = u64::from_le_bytes(seq);
    let body_len = read_u32(bytes, 8) as usize;
    let expected_crc = read_u32(bytes, 16);

    let frame_len = HEADER_SIZE + body_len;
    if bytes.len() < frame_len {
        return FrameRead::Incomplete;
    }

    // Step 2: Check the body
    let body = &bytes[HEADER_SIZE..frame_len];
    let actual_crc = crc32fast::hash(body);
    if actual_crc != expected_crc {
        return FrameRead::Corrupt {
            len: frame_len,
            reason: format!(
                "CRC mismatch at seq {}: expected {:08x}, got {:08x}",
                seq, expected_crc, actual_crc
            ),
        };
    }

    match bincode::deserialize::<LogOp>(body) {
        Ok(op) => FrameRead::Entry(LogEntry { seq, op }, frame_len),
        Err(e) => FrameRead::Corrupt {
            len: frame_len,
            reason: format!("undecodable body at seq {}: {}", seq, e),
        },
    }
}
