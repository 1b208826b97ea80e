//! Query Module
//!
//! Fluent, type-state builder over [`Store`] scans.
//!
//! ## State Machine
//! ```text
//!            store.query()
//!                 │
//!        ┌────────┼──────────────┐
//!        │        │              │
//!   prefix(p)? contains(c)?      │
//!        │        │              │
//!        └──► KeyQuery ◄─────────┘ (no key axis)
//!                 │
//!        ┌────────┴───────┐
//!        ▼                ▼
//!   of_type::<T>()    any_type()
//!   TypedQuery<T>     AnyQuery
//!        │                │
//!        └──► keys() / values() / entries()
//! ```
//!
//! Every builder is consumed by the next step and only ever carries a
//! finished [`QuerySpec`], so prefix and contains can never both be set.

use std::marker::PhantomData;

use crate::engine::{KeyPredicate, Row};
use crate::error::{KvError, Result};
use crate::store::{Entry, Store};
use crate::value::{Storable, Value};

// =============================================================================
// Query Spec
// =============================================================================

/// A fully validated scan request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySpec {
    /// Every row
    All,

    ByPrefix(String),
    ByContains(String),

    /// Rows stored under exactly this tag
    ByType(String),

    ByPrefixAndType { prefix: String, tag: String },
    ByContainsAndType { needle: String, tag: String },

    /// Type filter naming a type with no tag binding; matches nothing
    Unbound(String),
}

impl QuerySpec {
    fn from_parts(key: KeyPredicate, tag: Option<String>) -> Self {
        match (key, tag) {
            (KeyPredicate::None, None) => QuerySpec::All,
            (KeyPredicate::Prefix(prefix), None) => QuerySpec::ByPrefix(prefix),
            (KeyPredicate::Contains(needle), None) => QuerySpec::ByContains(needle),
            (KeyPredicate::None, Some(tag)) => QuerySpec::ByType(tag),
            (KeyPredicate::Prefix(prefix), Some(tag)) => QuerySpec::ByPrefixAndType { prefix, tag },
            (KeyPredicate::Contains(needle), Some(tag)) => {
                QuerySpec::ByContainsAndType { needle, tag }
            }
        }
    }

    /// Key axis handed to the engine scan
    pub fn key_predicate(&self) -> KeyPredicate {
        match self {
            QuerySpec::ByPrefix(prefix) | QuerySpec::ByPrefixAndType { prefix, .. } => {
                KeyPredicate::Prefix(prefix.clone())
            }
            QuerySpec::ByContains(needle) | QuerySpec::ByContainsAndType { needle, .. } => {
                KeyPredicate::Contains(needle.clone())
            }
            QuerySpec::All | QuerySpec::ByType(_) | QuerySpec::Unbound(_) => KeyPredicate::None,
        }
    }

    /// Tag filter handed to the engine scan
    pub fn tag(&self) -> Option<&str> {
        match self {
            QuerySpec::ByType(tag)
            | QuerySpec::ByPrefixAndType { tag, .. }
            | QuerySpec::ByContainsAndType { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }
}

/// Run the single engine scan a `QuerySpec` describes
fn execute(store: &Store, spec: &QuerySpec) -> Result<Vec<Row>> {
    if let QuerySpec::Unbound(type_name) = spec {
        tracing::warn!(type_name = %type_name, "query type filter has no tag binding; returning no rows");
        return Ok(Vec::new());
    }

    let rows = store.scan(&spec.key_predicate(), spec.tag())?;
    tracing::trace!(?spec, rows = rows.len(), "executed query");
    Ok(rows)
}

fn non_empty(axis: &str, value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(KvError::InvalidArgument(format!(
            "{} filter must not be empty",
            axis
        )));
    }
    Ok(value.to_string())
}

// =============================================================================
// Builders
// =============================================================================

/// Entry point returned by [`Store::query`]
pub struct Query<'a> {
    store: &'a Store,
}

impl<'a> Query<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Keys starting with `prefix`
    pub fn prefix(self, prefix: &str) -> Result<KeyQuery<'a>> {
        Ok(KeyQuery {
            store: self.store,
            key: KeyPredicate::Prefix(non_empty("prefix", prefix)?),
        })
    }

    /// Keys containing `needle`
    pub fn contains(self, needle: &str) -> Result<KeyQuery<'a>> {
        Ok(KeyQuery {
            store: self.store,
            key: KeyPredicate::Contains(non_empty("contains", needle)?),
        })
    }

    pub fn of_type<T: Storable>(self) -> TypedQuery<'a, T> {
        self.into_key_query().of_type()
    }

    pub fn any_type(self) -> AnyQuery<'a> {
        self.into_key_query().any_type()
    }

    fn into_key_query(self) -> KeyQuery<'a> {
        KeyQuery {
            store: self.store,
            key: KeyPredicate::None,
        }
    }
}

/// Query with its key axis chosen
pub struct KeyQuery<'a> {
    store: &'a Store,
    key: KeyPredicate,
}

impl<'a> KeyQuery<'a> {
    /// Restrict to rows stored as `T`
    ///
    /// A `T` with no tag binding produces a query that matches nothing.
    pub fn of_type<T: Storable>(self) -> TypedQuery<'a, T> {
        let kind = T::kind();
        let spec = match self.store.registry().tag_for_type(kind) {
            Some(tag) => QuerySpec::from_parts(self.key, Some(tag)),
            None => QuerySpec::Unbound(kind.name().to_string()),
        };
        TypedQuery {
            store: self.store,
            spec,
            _marker: PhantomData,
        }
    }

    pub fn any_type(self) -> AnyQuery<'a> {
        AnyQuery {
            store: self.store,
            spec: QuerySpec::from_parts(self.key, None),
        }
    }

    pub fn keys(self) -> Result<Vec<String>> {
        self.any_type().keys()
    }

    pub fn values(self) -> Result<Vec<Value>> {
        self.any_type().values()
    }

    pub fn entries(self) -> Result<Vec<Entry<Value>>> {
        self.any_type().entries()
    }
}

// =============================================================================
// Terminal Queries
// =============================================================================

/// Query decoding every match as `T`
pub struct TypedQuery<'a, T> {
    store: &'a Store,
    spec: QuerySpec,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Storable> TypedQuery<'a, T> {
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn keys(self) -> Result<Vec<String>> {
        Ok(execute(self.store, &self.spec)?
            .into_iter()
            .map(|row| row.key)
            .collect())
    }

    pub fn values(self) -> Result<Vec<T>> {
        Ok(self.entries()?.into_iter().map(|entry| entry.value).collect())
    }

    pub fn entries(self) -> Result<Vec<Entry<T>>> {
        let rows = execute(self.store, &self.spec)?;
        self.store
            .decode_rows(rows)?
            .into_iter()
            .map(|entry| {
                Ok(Entry {
                    key: entry.key,
                    value: T::from_value(entry.value)?,
                })
            })
            .collect()
    }
}

/// Query returning values as stored
pub struct AnyQuery<'a> {
    store: &'a Store,
    spec: QuerySpec,
}

impl<'a> AnyQuery<'a> {
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn keys(self) -> Result<Vec<String>> {
        Ok(execute(self.store, &self.spec)?
            .into_iter()
            .map(|row| row.key)
            .collect())
    }

    pub fn values(self) -> Result<Vec<Value>> {
        let rows = execute(self.store, &self.spec)?;
        Ok(self
            .store
            .decode_rows(rows)?
            .into_iter()
            .map(|entry| entry.value)
            .collect())
    }

    /// Key/value pairs; requires a prefix or contains filter
    pub fn entries(self) -> Result<Vec<Entry<Value>>> {
        if self.spec == QuerySpec::All {
            return Err(KvError::InvalidArgument(
                "untyped entries() needs a prefix or contains filter".to_string(),
            ));
        }
        let rows = execute(self.store, &self.spec)?;
        self.store.decode_rows(rows)
    }
}
