//! Durable log engine
//!
//! Every mutation is appended to the row log before it touches the
//! in-memory index; opening the engine replays the log to rebuild it.
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Writes** (upsert/delete/clear/compact): serialized by the `log` mutex,
//!   held across log append and index update
//! - **Reads** (lookup/exists/scan/count): index read lock only

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::log::{LogOp, LogReplay, LogWriter, ReplayStats};

use super::{scan_index, Engine, KeyPredicate, Row};

/// Engine persisting rows to `{data_dir}/typedkv.log`
pub struct LogEngine {
    /// Engine configuration
    config: Config,

    /// Path of the active log file
    log_path: PathBuf,

    /// Append handle; also the write lock
    log: Mutex<LogWriter>,

    /// Live rows rebuilt from the log
    index: RwLock<BTreeMap<String, Row>>,

    /// What the last open found in the log
    replay_stats: ReplayStats,
}

impl LogEngine {
    const LOG_FILENAME: &'static str = "typedkv.log";
    const COMPACT_FILENAME: &'static str = "typedkv.log.compact";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Replay the log if it exists
    /// 3. Reopen the log for appending
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&config.data_dir)?;
        let log_path = config.data_dir.join(Self::LOG_FILENAME);

        // Step 2: Rebuild the index
        let mut index = BTreeMap::new();
        let replay_stats = if log_path.exists() {
            let (entries, stats) = LogReplay::replay(&log_path)?;
            for entry in entries {
                Self::apply(&mut index, entry.op);
            }
            stats
        } else {
            ReplayStats::default()
        };

        tracing::info!(
            path = %log_path.display(),
            recovered = replay_stats.entries_recovered,
            corrupted = replay_stats.entries_corrupted,
            truncated = replay_stats.was_truncated,
            rows = index.len(),
            "opened row log"
        );

        // Step 3: Continue numbering after the last recovered frame
        let writer = LogWriter::open(&log_path, config.sync_strategy, replay_stats.last_seq + 1)?;

        Ok(Self {
            config,
            log_path,
            log: Mutex::new(writer),
            index: RwLock::new(index),
            replay_stats,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    fn apply(index: &mut BTreeMap<String, Row>, op: LogOp) {
        match op {
            LogOp::Upsert { key, tag, payload } => {
                index.insert(key.clone(), Row { key, tag, payload });
            }
            LogOp::Delete { key } => {
                index.remove(&key);
            }
        }
    }

    /// Rewrite the log so it holds exactly one frame per live row
    ///
    /// The new log is written beside the old one and renamed over it, so a
    /// crash mid-compaction leaves the previous log intact.
    pub fn compact(&self) -> Result<usize> {
        let mut log = self.log.lock();
        let index = self.index.read();
        let compact_path = self.config.data_dir.join(Self::COMPACT_FILENAME);

        // Step 1: Write live rows to a fresh file
        if compact_path.exists() {
            fs::remove_file(&compact_path)?;
        }
        let mut writer = LogWriter::open(&compact_path, self.config.sync_strategy, 1)?;
        for row in index.values() {
            writer.append(LogOp::Upsert {
                key: row.key.clone(),
                tag: row.tag.clone(),
                payload: row.payload.clone(),
            })?;
        }
        writer.sync()?;
        drop(writer);

        // Step 2: Swap it in and reopen for appending
        fs::rename(&compact_path, &self.log_path)?;
        *log = LogWriter::open(&self.log_path, self.config.sync_strategy, index.len() as u64 + 1)?;

        tracing::info!(rows = index.len(), "compacted row log");
        Ok(index.len())
    }

    /// Flush any frames not yet synced
    pub fn sync(&self) -> Result<()> {
        self.log.lock().sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn replay_stats(&self) -> ReplayStats {
        self.replay_stats
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Engine for LogEngine {
    fn upsert(&self, key: &str, tag: &str, payload: &[u8]) -> Result<()> {
        let mut log = self.log.lock();

        // Step 1: Log first (durability guarantee)
        log.append(LogOp::Upsert {
            key: key.to_string(),
            tag: tag.to_string(),
            payload: payload.to_vec(),
        })?;

        // Step 2: Apply to the index
        self.index.write().insert(
            key.to_string(),
            Row {
                key: key.to_string(),
                tag: tag.to_string(),
                payload: payload.to_vec(),
            },
        );
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<Option<Row>> {
        Ok(self.index.read().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut log = self.log.lock();

        if !self.index.read().contains_key(key) {
            return Ok(false);
        }

        log.append(LogOp::Delete {
            key: key.to_string(),
        })?;
        self.index.write().remove(key);
        Ok(true)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.index.read().contains_key(key))
    }

    fn scan(&self, key: &KeyPredicate, tag: Option<&str>) -> Result<Vec<Row>> {
        Ok(scan_index(&self.index.read(), key, tag))
    }

    fn clear(&self) -> Result<usize> {
        let mut log = self.log.lock();

        log.truncate()?;
        let mut index = self.index.write();
        let removed = index.len();
        index.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.index.read().len())
    }
}
