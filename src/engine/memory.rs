//! In-memory engine
//!
//! BTreeMap-based row table with RwLock for concurrency.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::Result;

use super::{scan_index, Engine, KeyPredicate, Row};

/// Volatile engine; rows live as long as the value does
#[derive(Default)]
pub struct MemoryEngine {
    rows: RwLock<BTreeMap<String, Row>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for MemoryEngine {
    fn upsert(&self, key: &str, tag: &str, payload: &[u8]) -> Result<()> {
        let row = Row {
            key: key.to_string(),
            tag: tag.to_string(),
            payload: payload.to_vec(),
        };
        self.rows.write().insert(row.key.clone(), row);
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<Option<Row>> {
        Ok(self.rows.read().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.rows.write().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.rows.read().contains_key(key))
    }

    fn scan(&self, key: &KeyPredicate, tag: Option<&str>) -> Result<Vec<Row>> {
        Ok(scan_index(&self.rows.read(), key, tag))
    }

    fn clear(&self) -> Result<usize> {
        let mut rows = self.rows.write();
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.rows.read().len())
    }
}
