//! Tests for the query builder
//!
//! These tests verify:
//! - Prefix / contains key filters
//! - Type filters, alone and combined with key filters
//! - Validation of empty filters and untyped entries()
//! - Unbound type filters yield nothing
//! - The spec each builder produces

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typedkv::{
    ConverterRegistry, KvError, LogEngine, MemoryEngine, Object, QuerySpec, Store, Value,
};
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Foo {
    n: u32,
}

impl Object for Foo {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Bar {
    label: String,
}

impl Object for Bar {}

#[derive(Debug)]
struct Unbound;

impl Object for Unbound {}

fn setup_store() -> Store {
    let registry = ConverterRegistry::new();
    registry.register::<Foo>("foo").unwrap();
    registry.register::<Bar>("bar").unwrap();
    Store::new(Arc::new(MemoryEngine::new()), Arc::new(registry))
}

fn key_set(keys: Vec<String>) -> BTreeSet<String> {
    keys.into_iter().collect()
}

fn set_of(keys: &[&str]) -> BTreeSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

/// a-1, a-2, b-1 as Foo; a-3 as Bar; a-4 as i32
fn seed(store: &Store) {
    store.set("a-1", Foo { n: 1 }).unwrap();
    store.set("a-2", Foo { n: 2 }).unwrap();
    store.set("b-1", Foo { n: 3 }).unwrap();
    store.set("a-3", Bar { label: "x".into() }).unwrap();
    store.set("a-4", 4i32).unwrap();
}

// =============================================================================
// Key Filter Tests
// =============================================================================

#[test]
fn test_prefix_and_type_keys() {
    let store = setup_store();
    store.set("a-1", Foo { n: 1 }).unwrap();
    store.set("a-2", Foo { n: 2 }).unwrap();
    store.set("b-1", Foo { n: 3 }).unwrap();

    let keys = store.query().prefix("a-").unwrap().of_type::<Foo>().keys().unwrap();
    assert_eq!(key_set(keys), set_of(&["a-1", "a-2"]));
}

#[test]
fn test_contains_any_type_keys() {
    let store = setup_store();
    store.set("gist-1", Foo { n: 1 }).unwrap();
    store.set("other", Bar { label: "o".into() }).unwrap();
    store.set("gist-2", 2i64).unwrap();

    let keys = store.query().contains("gist").unwrap().any_type().keys().unwrap();
    assert_eq!(key_set(keys), set_of(&["gist-1", "gist-2"]));
}

#[test]
fn test_contains_matches_anywhere() {
    let store = setup_store();
    store.set("my-gist", 1i32).unwrap();
    store.set("gist", 2i32).unwrap();
    store.set("gis", 3i32).unwrap();

    let keys = store.query().contains("gist").unwrap().keys().unwrap();
    assert_eq!(key_set(keys), set_of(&["my-gist", "gist"]));
}

#[test]
fn test_prefix_without_type_mixes_types() {
    let store = setup_store();
    seed(&store);

    let entries = store.query().prefix("a-").unwrap().entries().unwrap();
    assert_eq!(entries.len(), 4);

    let a4 = entries.iter().find(|e| e.key == "a-4").unwrap();
    assert!(matches!(a4.value, Value::Int(4)));
}

#[test]
fn test_prefix_matches_nothing() {
    let store = setup_store();
    seed(&store);

    let keys = store.query().prefix("zzz").unwrap().keys().unwrap();
    assert!(keys.is_empty());
}

// =============================================================================
// Type Filter Tests
// =============================================================================

#[test]
fn test_type_only_values() {
    let store = setup_store();
    seed(&store);

    let mut values = store.query().of_type::<Foo>().values().unwrap();
    values.sort_by_key(|foo| foo.n);
    assert_eq!(values, vec![Foo { n: 1 }, Foo { n: 2 }, Foo { n: 3 }]);
}

#[test]
fn test_typed_entries() {
    let store = setup_store();
    seed(&store);

    let entries = store.query().prefix("a-").unwrap().of_type::<Bar>().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "a-3");
    assert_eq!(entries[0].value, Bar { label: "x".into() });
}

#[test]
fn test_builtin_type_filter() {
    let store = setup_store();
    seed(&store);

    let entries = store.query().of_type::<i32>().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].value, 4);
}

#[test]
fn test_contains_and_type() {
    let store = setup_store();
    seed(&store);

    let keys = store.query().contains("-1").unwrap().of_type::<Foo>().keys().unwrap();
    assert_eq!(key_set(keys), set_of(&["a-1", "b-1"]));
}

#[test]
fn test_unbound_type_is_empty() {
    let store = setup_store();
    seed(&store);

    let query = store.query().of_type::<Unbound>();
    assert!(matches!(query.spec(), QuerySpec::Unbound(_)));
    assert!(query.keys().unwrap().is_empty());

    let values = store.query().prefix("a-").unwrap().of_type::<Unbound>().values().unwrap();
    assert!(values.is_empty());
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_empty_prefix_rejected() {
    let store = setup_store();
    assert!(matches!(
        store.query().prefix("").err(),
        Some(KvError::InvalidArgument(_))
    ));
}

#[test]
fn test_empty_contains_rejected() {
    let store = setup_store();
    assert!(matches!(
        store.query().contains("").err(),
        Some(KvError::InvalidArgument(_))
    ));
}

#[test]
fn test_any_type_entries_without_key_filter_rejected() {
    let store = setup_store();
    seed(&store);

    let err = store.query().any_type().entries().unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));
}

#[test]
fn test_any_type_keys_and_values_without_key_filter() {
    let store = setup_store();
    seed(&store);

    assert_eq!(store.query().any_type().keys().unwrap().len(), 5);
    assert_eq!(store.query().any_type().values().unwrap().len(), 5);
}

// =============================================================================
// Spec Construction Tests
// =============================================================================

#[test]
fn test_specs() {
    let store = setup_store();

    assert_eq!(store.query().any_type().spec(), &QuerySpec::All);
    assert_eq!(
        store.query().prefix("p").unwrap().any_type().spec(),
        &QuerySpec::ByPrefix("p".to_string())
    );
    assert_eq!(
        store.query().contains("c").unwrap().any_type().spec(),
        &QuerySpec::ByContains("c".to_string())
    );
    assert_eq!(
        store.query().of_type::<Foo>().spec(),
        &QuerySpec::ByType("foo".to_string())
    );
    assert_eq!(
        store.query().prefix("p").unwrap().of_type::<Bar>().spec(),
        &QuerySpec::ByPrefixAndType {
            prefix: "p".to_string(),
            tag: "bar".to_string()
        }
    );
    assert_eq!(
        store.query().contains("c").unwrap().of_type::<i64>().spec(),
        &QuerySpec::ByContainsAndType {
            needle: "c".to_string(),
            tag: "kv.long".to_string()
        }
    );
}

// =============================================================================
// Durable Engine Tests
// =============================================================================

#[test]
fn test_queries_over_log_engine() {
    let temp_dir = TempDir::new().unwrap();
    let registry = Arc::new(ConverterRegistry::new());
    registry.register::<Foo>("foo").unwrap();
    registry.register::<Bar>("bar").unwrap();

    let engine = Arc::new(LogEngine::open_path(temp_dir.path()).unwrap());
    let store = Store::new(engine, registry);
    seed(&store);

    let keys = store.query().prefix("a-").unwrap().of_type::<Foo>().keys().unwrap();
    assert_eq!(key_set(keys), set_of(&["a-1", "a-2"]));
}
