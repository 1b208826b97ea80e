//! Log Writer
//!
//! Handles appending frames to the log file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::config::SyncStrategy;
use crate::error::Result;

use super::{LogEntry, LogOp};

/// Writes frames to the log file
pub struct LogWriter {
    /// Append handle
    file: File,

    /// Sequence number given to the next frame
    next_seq: u64,

    /// When to fsync
    sync_strategy: SyncStrategy,

    /// Frames written since the last fsync
    unsynced: usize,

    /// File length after the last complete frame
    len: u64,
}

impl LogWriter {
    /// Open or create a log file, continuing at `next_seq`
    pub fn open(path: &Path, sync_strategy: SyncStrategy, next_seq: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            file,
            next_seq,
            sync_strategy,
            unsynced: 0,
            len,
        })
    }

    /// Append a frame, returning its sequence number
    pub fn append(&mut self, op: LogOp) -> Result<u64> {
        let seq = self.next_seq;
        let bytes = LogEntry::new(seq, op).serialize()?;

        if let Err(e) = self.file.write_all(&bytes) {
            // A partial frame must not sit in front of later appends
            if let Err(rollback) = self.file.set_len(self.len) {
                tracing::error!(
                    seq,
                    len = self.len,
                    error = %rollback,
                    "failed to roll back partial log frame"
                );
            }
            return Err(e.into());
        }
        self.len += bytes.len() as u64;
        self.next_seq += 1;
        self.unsynced += 1;

        let should_sync = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if should_sync {
            self.sync()?;
        }

        Ok(seq)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every frame; sequence numbers keep increasing
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.len = 0;
        self.sync()
    }

    /// Bytes of complete frames in the file
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sequence number the next frame will get
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}
