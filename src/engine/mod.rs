//! Engine Module
//!
//! The row store the typed façade is layered on.
//!
//! ## Contract
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ key (unique) │ tag (filterable) │ payload │
//! └───────────────────────────────────────────┘
//! ```
//! - `upsert` replaces the whole row, never individual fields
//! - `delete` reports whether a row was actually removed
//! - `scan` filters by key predicate and/or exact tag, in no promised order
//! - Each call provides its own write serialization and per-row durability
//!
//! Two implementations ship with the crate: [`MemoryEngine`] for embedding
//! and tests, and [`LogEngine`] which persists every mutation to an
//! append-only log before applying it.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::Result;

mod durable;
mod memory;

pub use durable::LogEngine;
pub use memory::MemoryEngine;

/// A persisted row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub tag: String,
    pub payload: Vec<u8>,
}

/// Key axis of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPredicate {
    /// Every key
    None,

    /// Keys starting with the string
    Prefix(String),

    /// Keys containing the string anywhere
    Contains(String),
}

impl KeyPredicate {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPredicate::None => true,
            KeyPredicate::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPredicate::Contains(needle) => key.contains(needle.as_str()),
        }
    }
}

/// Storage backend consumed by [`Store`](crate::store::Store)
pub trait Engine: Send + Sync {
    /// Insert or replace the row for `key`
    fn upsert(&self, key: &str, tag: &str, payload: &[u8]) -> Result<()>;

    fn lookup(&self, key: &str) -> Result<Option<Row>>;

    /// `true` only if a row existed and was removed
    fn delete(&self, key: &str) -> Result<bool>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Rows matching `key`, restricted to `tag` when given
    fn scan(&self, key: &KeyPredicate, tag: Option<&str>) -> Result<Vec<Row>>;

    /// Remove every row, returning how many were removed
    fn clear(&self) -> Result<usize>;

    fn count(&self) -> Result<usize>;
}

/// Scan a key-ordered index
///
/// Prefix scans seek straight to the first candidate key.
pub(crate) fn scan_index(
    index: &BTreeMap<String, Row>,
    key: &KeyPredicate,
    tag: Option<&str>,
) -> Vec<Row> {
    let tag_matches = |row: &Row| tag.map_or(true, |tag| row.tag == tag);

    match key {
        KeyPredicate::Prefix(prefix) => index
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix.as_str()))
            .map(|(_, row)| row)
            .filter(|row| tag_matches(*row))
            .cloned()
            .collect(),
        other => index
            .values()
            .filter(|row| other.matches(&row.key) && tag_matches(*row))
            .cloned()
            .collect(),
    }
}
