//! Store Module
//!
//! Typed CRUD façade composing the registry, codec and an [`Engine`].
//!
//! ## Write Path
//! ```text
//! set(key, value)
//!   │
//!   ├─ Storable::into_value
//!   ├─ ConverterRegistry::encode  ──► (tag, payload)
//!   ├─ ValueRecord::new           ──► validated envelope
//!   └─ Engine::upsert             ──► whole-row replace
//! ```
//!
//! ## Read Path
//! ```text
//! get::<T>(key)
//!   │
//!   ├─ Engine::lookup             ──► Row {tag, payload} or None
//!   ├─ tag check against T        ──► TypeMismatch
//!   ├─ ConverterRegistry::decode  ──► Value
//!   └─ Storable::from_value       ──► T
//! ```
//!
//! Encode+upsert and lookup+decode each run under the store's dispatch mutex,
//! so a tag resolution and its byte conversion never interleave with another
//! dispatch step. This is not a cross-key transaction.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec;
use crate::engine::{Engine, KeyPredicate, Row};
use crate::error::{KvError, Result};
use crate::query::Query;
use crate::record::ValueRecord;
use crate::registry::{ConverterRegistry, StoredType};
use crate::value::{Storable, Value};

/// A key and its decoded value, produced by queries
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub key: String,
    pub value: T,
}

/// Typed key-value store
pub struct Store {
    /// Row backend
    engine: Arc<dyn Engine>,

    /// Tag bindings shared with other stores
    registry: Arc<ConverterRegistry>,

    /// Serializes encode/decode dispatch steps
    dispatch: Mutex<()>,
}

impl Store {
    pub fn new(engine: Arc<dyn Engine>, registry: Arc<ConverterRegistry>) -> Self {
        Self {
            engine,
            registry,
            dispatch: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a typed value, replacing whatever `key` held
    pub fn set<V: Storable>(&self, key: &str, value: V) -> Result<()> {
        self.set_value(key, value.into_value())
    }

    /// Store a homogeneous list
    ///
    /// An empty list has no element tag and is rejected before the engine is
    /// touched.
    pub fn set_list<T: Storable>(&self, key: &str, items: Vec<T>) -> Result<()> {
        if items.is_empty() {
            return Err(KvError::InvalidArgument(format!(
                "cannot store an empty list under `{}`",
                key
            )));
        }
        self.set_value(key, Value::List(items.into_iter().map(Storable::into_value).collect()))
    }

    /// Store a dynamically typed value
    pub fn set_value(&self, key: &str, value: Value) -> Result<()> {
        let _dispatch = self.dispatch.lock();

        // Step 1: Resolve tag and encode
        let record = self.build_record(&value)?;

        // Step 2: Hand the row to the engine
        self.write_record(key, record)
    }

    /// Encode a value into a record without writing it
    pub fn record(&self, value: &Value) -> Result<ValueRecord> {
        let _dispatch = self.dispatch.lock();
        self.build_record(value)
    }

    /// Write a prepared record under `key`
    ///
    /// A record under a built-in tag must decode under that tag; user tag
    /// payloads are written as given. The expiry is advisory and is not
    /// persisted by the engine contract.
    pub fn put_record(&self, key: &str, record: ValueRecord) -> Result<()> {
        let _dispatch = self.dispatch.lock();

        // Step 1: Refuse built-in rows that could never be read back
        if codec::is_reserved(record.tag()) {
            self.registry
                .decode(record.payload(), record.tag())
                .map_err(|e| {
                    KvError::InvalidArgument(format!(
                        "record payload does not match tag `{}`: {}",
                        record.tag(),
                        e
                    ))
                })?;
        }

        // Step 2: Hand the row to the engine
        self.write_record(key, record)
    }

    fn build_record(&self, value: &Value) -> Result<ValueRecord> {
        let (tag, payload) = self.registry.encode(value)?;
        ValueRecord::new(tag, payload)
    }

    fn write_record(&self, key: &str, record: ValueRecord) -> Result<()> {
        let (tag, payload) = record.into_parts();
        self.engine.upsert(key, &tag, &payload)?;
        tracing::debug!(key, tag = %tag, bytes = payload.len(), "set");
        Ok(())
    }

    /// Remove `key`; `true` only if a row was removed
    pub fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.engine.delete(key)?;
        tracing::debug!(key, removed, "delete");
        Ok(removed)
    }

    /// Remove every row, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let removed = self.engine.clear()?;
        tracing::debug!(removed, "clear");
        Ok(removed)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read `key` as `T`
    ///
    /// Returns `Ok(None)` when the key is absent and `TypeMismatch` when the
    /// stored value has another type. A payload that fails to decode is an
    /// error for this call only; the row is left as it is.
    pub fn get<T: Storable>(&self, key: &str) -> Result<Option<T>> {
        let expected = self.registry.tag_for_type(T::kind());
        let value = match self.lookup_decoded(key, expected.as_deref(), T::kind().name())? {
            Some(value) => value,
            None => return Ok(None),
        };
        T::from_value(value).map(Some)
    }

    /// Read `key` as a list of `T`
    pub fn get_list<T: Storable>(&self, key: &str) -> Result<Option<Vec<T>>> {
        let expected = self
            .registry
            .tag_for_type(T::kind())
            .map(|element| codec::list_tag(&element));
        let expected_name = format!("List<{}>", T::kind().name());

        let value = match self.lookup_decoded(key, expected.as_deref(), &expected_name)? {
            Some(value) => value,
            None => return Ok(None),
        };
        match value {
            Value::List(items) => items
                .into_iter()
                .map(T::from_value)
                .collect::<Result<Vec<_>>>()
                .map(Some),
            other => Err(KvError::TypeMismatch {
                expected: expected_name,
                found: other.type_name(),
            }),
        }
    }

    /// Read `key` with whatever type it was stored as
    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        self.lookup_decoded(key, None, "")
    }

    fn lookup_decoded(
        &self,
        key: &str,
        expected_tag: Option<&str>,
        expected_name: &str,
    ) -> Result<Option<Value>> {
        let _dispatch = self.dispatch.lock();

        let row = match self.engine.lookup(key)? {
            Some(row) => row,
            None => return Ok(None),
        };

        if let Some(expected_tag) = expected_tag {
            if row.tag != expected_tag {
                return Err(KvError::TypeMismatch {
                    expected: expected_name.to_string(),
                    found: self.registry.type_for(&row.tag).to_string(),
                });
            }
        }

        self.registry.decode(&row.payload, &row.tag).map(Some)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.engine.exists(key)
    }

    /// Type of the value stored under `key`
    ///
    /// A tag with no binding in this process yields [`StoredType::Unknown`]
    /// rather than an error.
    pub fn type_of(&self, key: &str) -> Result<Option<StoredType>> {
        let row = match self.engine.lookup(key)? {
            Some(row) => row,
            None => return Ok(None),
        };
        let stored = self.registry.type_for(&row.tag);
        if stored.is_unknown() {
            tracing::warn!(key, tag = %row.tag, "stored tag has no binding");
        }
        Ok(Some(stored))
    }

    pub fn count(&self) -> Result<usize> {
        self.engine.count()
    }

    /// Start a filtered scan
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    // =========================================================================
    // Query Support
    // =========================================================================

    pub(crate) fn scan(&self, key: &KeyPredicate, tag: Option<&str>) -> Result<Vec<Row>> {
        self.engine.scan(key, tag)
    }

    /// Decode scanned rows under one dispatch step
    pub(crate) fn decode_rows(&self, rows: Vec<Row>) -> Result<Vec<Entry<Value>>> {
        let _dispatch = self.dispatch.lock();
        rows.into_iter()
            .map(|row| {
                let value = self.registry.decode(&row.payload, &row.tag)?;
                Ok(Entry {
                    key: row.key,
                    value,
                })
            })
            .collect()
    }
}
