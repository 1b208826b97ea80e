//! Tests for Store
//!
//! These tests verify:
//! - Basic set/get/delete/exists operations
//! - Whole-row replacement across types
//! - Failures leave the store unmodified
//! - Lists of objects and built-ins
//! - Type introspection, records and concurrent access

use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use typedkv::codec::BuiltinType;
use typedkv::{
    ConverterRegistry, Engine, KvError, MemoryEngine, Object, Store, StoredType, TypeDescriptor,
    Value, ValueRecord,
};

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Gist {
    id: String,
    files: Vec<String>,
}

impl Object for Gist {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    body: String,
}

impl Object for Note {}

#[derive(Debug)]
struct Unregistered;

impl Object for Unregistered {}

fn gist(id: &str) -> Gist {
    Gist {
        id: id.to_string(),
        files: vec![format!("{}.rs", id)],
    }
}

fn setup_store() -> Store {
    let registry = ConverterRegistry::new();
    registry.register::<Gist>("gist").unwrap();
    registry.register::<Note>("note").unwrap();
    Store::new(Arc::new(MemoryEngine::new()), Arc::new(registry))
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_get_missing_key() {
    let store = setup_store();
    assert_eq!(store.get::<i32>("missing").unwrap(), None);
    assert!(store.get_value("missing").unwrap().is_none());
    assert!(!store.exists("missing").unwrap());
    assert_eq!(store.type_of("missing").unwrap(), None);
}

#[test]
fn test_set_get_builtins() {
    let store = setup_store();
    store.set("int", 42i32).unwrap();
    store.set("long", -7i64).unwrap();
    store.set("double", 2.5f64).unwrap();
    store.set("flag", true).unwrap();
    store.set("byte", 0xabu8).unwrap();
    store.set("char", 'ß').unwrap();
    store.set("name", "typed".to_string()).unwrap();
    store.set("ints", vec![3i32, 1, 2]).unwrap();
    store.set("names", vec!["a".to_string(), "b".to_string()]).unwrap();

    assert_eq!(store.get::<i32>("int").unwrap(), Some(42));
    assert_eq!(store.get::<i64>("long").unwrap(), Some(-7));
    assert_eq!(store.get::<f64>("double").unwrap(), Some(2.5));
    assert_eq!(store.get::<bool>("flag").unwrap(), Some(true));
    assert_eq!(store.get::<u8>("byte").unwrap(), Some(0xab));
    assert_eq!(store.get::<char>("char").unwrap(), Some('ß'));
    assert_eq!(store.get::<String>("name").unwrap(), Some("typed".to_string()));
    assert_eq!(store.get::<Vec<i32>>("ints").unwrap(), Some(vec![3, 1, 2]));
    assert_eq!(
        store.get::<Vec<String>>("names").unwrap(),
        Some(vec!["a".to_string(), "b".to_string()])
    );
    assert_eq!(store.count().unwrap(), 9);
}

#[test]
fn test_set_get_object() {
    let store = setup_store();
    store.set("gist-1", gist("1")).unwrap();

    assert_eq!(store.get::<Gist>("gist-1").unwrap(), Some(gist("1")));
    assert!(store.exists("gist-1").unwrap());
}

#[test]
fn test_get_value_dynamic() {
    let store = setup_store();
    store.set("n", 5i32).unwrap();
    store.set("g", gist("g")).unwrap();

    assert!(matches!(store.get_value("n").unwrap(), Some(Value::Int(5))));
    match store.get_value("g").unwrap() {
        Some(Value::Object(object)) => {
            assert_eq!(object.downcast_ref::<Gist>(), Some(&gist("g")));
        }
        other => panic!("expected an object, got {:?}", other),
    }
}

// =============================================================================
// Replacement Tests
// =============================================================================

#[test]
fn test_set_same_value_twice() {
    let store = setup_store();
    store.set("k", gist("1")).unwrap();
    let count = store.count().unwrap();

    store.set("k", gist("1")).unwrap();

    assert_eq!(store.count().unwrap(), count);
    assert_eq!(store.get::<Gist>("k").unwrap(), Some(gist("1")));
}

#[test]
fn test_set_replaces_with_other_type() {
    let store = setup_store();
    store.set("k", gist("1")).unwrap();
    store.set("k", 99i32).unwrap();

    assert_eq!(store.get::<i32>("k").unwrap(), Some(99));
    assert_eq!(
        store.type_of("k").unwrap(),
        Some(StoredType::Builtin(BuiltinType::Int))
    );
    assert_eq!(store.count().unwrap(), 1);

    let err = store.get::<Gist>("k").unwrap_err();
    assert!(matches!(err, KvError::TypeMismatch { .. }));
}

#[test]
fn test_get_with_wrong_builtin_type() {
    let store = setup_store();
    store.set("k", "text".to_string()).unwrap();

    match store.get::<i32>("k").unwrap_err() {
        KvError::TypeMismatch { expected, found } => {
            assert_eq!(expected, "i32");
            assert_eq!(found, "String");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_get_with_wrong_object_type() {
    let store = setup_store();
    store.set("k", Note { body: "hi".into() }).unwrap();

    let err = store.get::<Gist>("k").unwrap_err();
    assert!(matches!(err, KvError::TypeMismatch { .. }));

    // The row is untouched
    assert_eq!(store.get::<Note>("k").unwrap(), Some(Note { body: "hi".into() }));
}

// =============================================================================
// Failure Semantics Tests
// =============================================================================

#[test]
fn test_set_unregistered_leaves_store_unchanged() {
    let store = setup_store();
    store.set("existing", 1i32).unwrap();

    let err = store.set("new", Unregistered).unwrap_err();
    assert!(matches!(err, KvError::UnmappedType(_)));
    assert_eq!(store.count().unwrap(), 1);
    assert!(!store.exists("new").unwrap());

    let err = store.set("existing", Unregistered).unwrap_err();
    assert!(matches!(err, KvError::UnmappedType(_)));
    assert_eq!(store.get::<i32>("existing").unwrap(), Some(1));
}

#[test]
fn test_set_empty_list_rejected_before_engine() {
    let engine = Arc::new(MemoryEngine::new());
    let store = Store::new(engine.clone(), Arc::new(ConverterRegistry::new()));

    let err = store.set_list::<Gist>("empty", Vec::new()).unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));

    let err = store.set_value("empty", Value::List(Vec::new())).unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));

    assert_eq!(engine.count().unwrap(), 0);
}

#[test]
fn test_non_bmp_char_rejected() {
    let store = setup_store();
    let err = store.set("emoji", '🦀').unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));
    assert!(!store.exists("emoji").unwrap());
}

#[test]
fn test_corrupt_row_is_left_in_place() {
    let engine = Arc::new(MemoryEngine::new());
    let store = Store::new(engine.clone(), Arc::new(ConverterRegistry::new()));
    engine.upsert("bad", "kv.int", &[1, 2]).unwrap();

    let err = store.get::<i32>("bad").unwrap_err();
    assert!(matches!(err, KvError::Decode(_)));
    assert!(store.exists("bad").unwrap());
    assert_eq!(engine.lookup("bad").unwrap().unwrap().payload, vec![1, 2]);
}

// =============================================================================
// Delete / Clear Tests
// =============================================================================

#[test]
fn test_delete_returns_true_once() {
    let store = setup_store();
    store.set("k", gist("1")).unwrap();

    assert!(store.delete("k").unwrap());
    assert!(!store.delete("k").unwrap());
    assert!(!store.delete("k").unwrap());
    assert_eq!(store.get::<Gist>("k").unwrap(), None);
    assert!(!store.exists("k").unwrap());
}

#[test]
fn test_delete_missing_key() {
    let store = setup_store();
    assert!(!store.delete("never-set").unwrap());
}

#[test]
fn test_clear_returns_removed_count() {
    let store = setup_store();
    for i in 0..5i32 {
        store.set(&format!("k{}", i), i).unwrap();
    }

    assert_eq!(store.clear().unwrap(), 5);
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.clear().unwrap(), 0);
}

// =============================================================================
// List Tests
// =============================================================================

#[test]
fn test_object_list_round_trip() {
    let store = setup_store();
    let gists = vec![gist("b"), gist("a"), gist("c")];
    store.set_list("gists", gists.clone()).unwrap();

    assert_eq!(store.get_list::<Gist>("gists").unwrap(), Some(gists));
    assert_eq!(
        store.type_of("gists").unwrap(),
        Some(StoredType::List(Box::new(StoredType::Object(
            TypeDescriptor::of::<Gist>()
        ))))
    );
}

#[test]
fn test_builtin_list_round_trip() {
    let store = setup_store();
    store.set_list("longs", vec![1i64, 2, 3]).unwrap();
    assert_eq!(store.get_list::<i64>("longs").unwrap(), Some(vec![1, 2, 3]));
}

#[test]
fn test_get_list_of_wrong_element_type() {
    let store = setup_store();
    store.set_list("notes", vec![Note { body: "x".into() }]).unwrap();

    let err = store.get_list::<Gist>("notes").unwrap_err();
    assert!(matches!(err, KvError::TypeMismatch { .. }));
}

#[test]
fn test_get_list_on_scalar() {
    let store = setup_store();
    store.set("k", 1i32).unwrap();

    let err = store.get_list::<i32>("k").unwrap_err();
    assert!(matches!(err, KvError::TypeMismatch { .. }));
}

// =============================================================================
// Type Introspection Tests
// =============================================================================

#[test]
fn test_type_of_unregistered_tag_is_unknown() {
    // Written by a process that had `legacy` registered
    let engine = Arc::new(MemoryEngine::new());
    engine.upsert("old", "legacy", b"payload").unwrap();

    let store = Store::new(engine, Arc::new(ConverterRegistry::new()));
    assert_eq!(
        store.type_of("old").unwrap(),
        Some(StoredType::Unknown("legacy".to_string()))
    );
}

// =============================================================================
// Record Tests
// =============================================================================

#[test]
fn test_record_then_put() {
    let store = setup_store();
    let record = store.record(&Value::Int(7)).unwrap();
    assert_eq!(record.tag(), "kv.int");
    assert_eq!(record.payload(), &[0, 0, 0, 7]);
    assert_eq!(record.expire_at(), None);

    store.put_record("seven", record).unwrap();
    assert_eq!(store.get::<i32>("seven").unwrap(), Some(7));
}

#[test]
fn test_put_record_rejects_mismatched_builtin_payload() {
    let store = setup_store();
    store.set("k", 1i32).unwrap();

    let short = ValueRecord::new("kv.int", vec![0, 7]).unwrap();
    let err = store.put_record("k", short).unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));

    let bad_list = ValueRecord::new("kv.list<gist>", vec![0, 0, 0, 9]).unwrap();
    let err = store.put_record("list", bad_list).unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));

    assert_eq!(store.get::<i32>("k").unwrap(), Some(1));
    assert!(!store.exists("list").unwrap());
}

#[test]
fn test_put_record_user_tag_is_opaque() {
    let store = setup_store();
    let record = ValueRecord::new("external", b"raw".to_vec()).unwrap();

    store.put_record("k", record).unwrap();

    assert!(store.exists("k").unwrap());
    assert!(store.type_of("k").unwrap().unwrap().is_unknown());
}

#[test]
fn test_record_validation_and_expiry() {
    let err = ValueRecord::new("", Vec::new()).unwrap_err();
    assert!(matches!(err, KvError::InvalidArgument(_)));

    let now = SystemTime::now();
    let record = ValueRecord::new("kv.string", Vec::new())
        .unwrap()
        .with_expiry(now + Duration::from_secs(60));
    assert!(!record.is_expired_at(now));
    assert!(record.is_expired_at(now + Duration::from_secs(61)));

    let aged = ValueRecord::new("kv.string", Vec::new())
        .unwrap()
        .with_max_age(Duration::from_secs(3600));
    assert!(aged.expire_at().unwrap() > now);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let store = Arc::new(setup_store());
    let mut handles = Vec::new();

    for t in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                let key = format!("t{}-{}", t, i);
                store.set(&key, gist(&key)).unwrap();
                assert_eq!(store.get::<Gist>(&key).unwrap(), Some(gist(&key)));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count().unwrap(), 200);
}

#[test]
fn test_concurrent_registration_and_writes() {
    let registry = Arc::new(ConverterRegistry::new());
    let store = Arc::new(Store::new(Arc::new(MemoryEngine::new()), Arc::clone(&registry)));

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..100 {
                store.set(&format!("n{}", i), i as i64).unwrap();
            }
        })
    };
    registry.register::<Gist>("gist").unwrap();
    writer.join().unwrap();

    store.set("g", gist("g")).unwrap();
    assert_eq!(store.count().unwrap(), 101);
}
