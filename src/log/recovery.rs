//! Log Replay
//!
//! Rebuilds state after a restart or crash by reading the log back.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::Result;

use super::{decode_frame, FrameRead, LogEntry, HEADER_SIZE};

/// Replays a log file
pub struct LogReplay;

/// Result of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Frames successfully recovered
    pub entries_recovered: u64,

    /// Damaged regions skipped before a later valid frame
    pub entries_corrupted: u64,

    /// Last valid sequence number (0 if none)
    pub last_seq: u64,

    /// Whether a torn tail was cut off the file
    pub was_truncated: bool,
}

impl LogReplay {
    /// Recover frames from a log file
    ///
    /// This will:
    /// 1. Read all valid frames in order
    /// 2. Skip damaged bytes up to the next frame that decodes cleanly
    /// 3. Truncate damaged bytes only when no valid frame follows them
    pub fn replay(path: &Path) -> Result<(Vec<LogEntry>, ReplayStats)> {
        let (entries, stats, valid_len) = Self::scan(path)?;

        if stats.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
            tracing::warn!(
                path = %path.display(),
                valid_len,
                "truncated torn tail of row log"
            );
        }

        Ok((entries, stats))
    }

    /// Inspect a log file without modifying it
    pub fn verify(path: &Path) -> Result<ReplayStats> {
        Self::scan(path).map(|(_, stats, _)| stats)
    }

    fn scan(path: &Path) -> Result<(Vec<LogEntry>, ReplayStats, usize)> {
        let bytes = fs::read(path)?;
        let mut entries = Vec::new();
        let mut stats = ReplayStats::default();
        let mut pos = 0;

        while pos < bytes.len() {
            let damaged = match decode_frame(&bytes[pos..]) {
                FrameRead::Entry(entry, len) => {
                    stats.entries_recovered += 1;
                    stats.last_seq = entry.seq;
                    entries.push(entry);
                    pos += len;
                    continue;
                }
                damaged => damaged,
            };

            if let Some(next) = Self::resync(&bytes, pos + 1, stats.last_seq) {
                tracing::warn!(
                    offset = pos,
                    skipped = next - pos,
                    ?damaged,
                    "skipping damaged log region"
                );
                stats.entries_corrupted += 1;
                pos = next;
                continue;
            }

            match damaged {
                // Whole frame present and its length is covered by the header CRC
                FrameRead::Corrupt { len, reason } => {
                    tracing::warn!(offset = pos, %reason, "skipping corrupted log frame");
                    stats.entries_corrupted += 1;
                    pos += len;
                }
                _ => {
                    stats.was_truncated = true;
                    break;
                }
            }
        }

        Ok((entries, stats, pos))
    }

    /// Offset of the first frame at or after `from` that decodes cleanly and
    /// continues the sequence
    fn resync(bytes: &[u8], from: usize, last_seq: u64) -> Option<usize> {
        let end = bytes.len().saturating_sub(HEADER_SIZE - 1);
        (from..end).find(|&pos| {
            matches!(
                decode_frame(&bytes[pos..]),
                FrameRead::Entry(ref entry, _) if entry.seq > last_seq
            )
        })
    }
}
