//! Edge case tests for shelf-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use serde_json::{json, Value};
use shelf_engine::{
    BackendSnapshot, CollectionIdentity, ErrorKind, MemoryBackend, SnapshotMetadata,
    SyncedCollection,
};

async fn json_cache(backend: &MemoryBackend) -> SyncedCollection<Value> {
    let cache =
        SyncedCollection::connect(backend.clone(), CollectionIdentity::new("TodoApp", 1, "todos"))
            .await;
    assert!(cache.is_ready());
    cache
}

fn ids(cache: &SyncedCollection<Value>) -> Vec<Value> {
    cache.data().iter().map(|r| r["id"].clone()).collect()
}

// ============================================================================
// Key Edge Cases
// ============================================================================

#[tokio::test]
async fn empty_string_key() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    cache.add(&json!({"id": "", "text": "empty"})).await.unwrap();

    assert_eq!(cache.get("").await.unwrap().unwrap()["text"], "empty");
}

#[tokio::test]
async fn unicode_keys() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    let keys = ["日本語テスト", "Привет мир", "🎉🚀💯", "Hello\nWorld\tTab"];
    for key in keys {
        cache.add(&json!({ "id": key })).await.unwrap();
    }

    assert_eq!(cache.data().len(), keys.len());
    for key in keys {
        assert!(cache.get(key).await.unwrap().is_some(), "missing {:?}", key);
    }
}

#[tokio::test]
async fn numbers_sort_before_strings() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    for id in [json!("10"), json!(10), json!("2"), json!(2), json!(-1.5)] {
        cache.put(&json!({ "id": id })).await.unwrap();
    }

    assert_eq!(
        ids(&cache),
        vec![json!(-1.5), json!(2), json!(10), json!("10"), json!("2")]
    );
}

#[tokio::test]
async fn integer_and_float_forms_are_the_same_key() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    cache.add(&json!({"id": 1, "v": "int"})).await.unwrap();
    let error = cache.add(&json!({"id": 1.0, "v": "float"})).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::OperationFailed);
    assert_eq!(cache.get(1).await.unwrap().unwrap()["v"], "int");
}

#[tokio::test]
async fn zero_and_negative_zero_are_the_same_key() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    cache.add(&json!({"id": 0, "v": "zero"})).await.unwrap();
    let error = cache.add(&json!({"id": -0.0, "v": "negative"})).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::OperationFailed);
    assert_eq!(cache.data().len(), 1);

    cache.put(&json!({"id": -0.0, "v": "negative"})).await.unwrap();
    assert_eq!(cache.data().len(), 1);
    assert_eq!(cache.get(0).await.unwrap().unwrap()["v"], "negative");

    cache.remove(-0.0).await.unwrap();
    assert!(cache.data().is_empty());
}

#[tokio::test]
async fn number_and_numeric_string_are_different_keys() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    cache.add(&json!({"id": 1})).await.unwrap();
    cache.add(&json!({"id": "1"})).await.unwrap();

    assert_eq!(cache.data().len(), 2);
    cache.remove(1).await.unwrap();
    assert_eq!(ids(&cache), vec![json!("1")]);
}

#[tokio::test]
async fn non_scalar_keys_are_rejected() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    for id in [json!(null), json!(true), json!([1]), json!({"a": 1})] {
        let error = cache.put(&json!({ "id": id })).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::OperationFailed);
    }
    assert!(cache.data().is_empty());
}

// ============================================================================
// Payload Edge Cases
// ============================================================================

#[tokio::test]
async fn very_long_strings() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    let long = "x".repeat(1_000_000);
    cache.add(&json!({"id": "long", "text": long})).await.unwrap();

    let record = cache.get("long").await.unwrap().unwrap();
    assert_eq!(record["text"].as_str().map(str::len), Some(1_000_000));
}

#[tokio::test]
async fn deeply_nested_json() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    let mut nested = json!("leaf");
    for _ in 0..64 {
        nested = json!({ "child": nested });
    }
    cache.put(&json!({"id": "deep", "tree": nested.clone()})).await.unwrap();

    assert_eq!(cache.data()[0]["tree"], nested);
}

#[tokio::test]
async fn record_values_survive_unchanged() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    let record = json!({
        "id": "all",
        "null": null,
        "bool": true,
        "int": i64::MAX,
        "float": 3.25,
        "array": [1, "two", null],
        "object": {"nested": {"deeper": [true]}},
    });
    cache.add(&record).await.unwrap();

    assert_eq!(cache.get("all").await.unwrap(), Some(record));
}

// ============================================================================
// Operation Ordering Edge Cases
// ============================================================================

#[tokio::test]
async fn rapid_updates_same_record() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    for i in 0..100 {
        cache.put(&json!({"id": "1", "count": i})).await.unwrap();
    }

    assert_eq!(*cache.data(), vec![json!({"id": "1", "count": 99})]);
}

#[tokio::test]
async fn interleaved_writes_from_two_caches() {
    let backend = MemoryBackend::new();
    let first = json_cache(&backend).await;
    let second = json_cache(&backend).await;

    first.put(&json!({"id": "1", "by": "first"})).await.unwrap();
    second.put(&json!({"id": "1", "by": "second"})).await.unwrap();
    first.put(&json!({"id": "2", "by": "first"})).await.unwrap();

    // Each refresh is a full scan, so the later writer's mirror sees both.
    assert_eq!(first.data().len(), 2);
    assert_eq!(first.data()[0]["by"], "second");
    // The other mirror is only as fresh as its own last refresh.
    assert_eq!(second.data().len(), 1);
}

// ============================================================================
// Lifecycle Edge Cases
// ============================================================================

#[tokio::test]
async fn close_is_idempotent() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;

    cache.close();
    cache.close();

    assert!(!cache.is_ready());
    assert!(cache.error().is_none());
    assert_eq!(backend.connection_count("TodoApp"), 0);
}

#[tokio::test]
async fn reconfigure_to_other_store_starts_with_empty_mirror() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;
    cache.add(&json!({"id": "1"})).await.unwrap();

    cache
        .reconfigure(CollectionIdentity::new("TodoApp", 2, "archive"))
        .await
        .unwrap();

    assert!(cache.is_ready());
    assert!(cache.data().is_empty());
    assert_eq!(cache.identity().store, "archive");
    assert_eq!(backend.connection_count("TodoApp"), 1);
}

#[tokio::test]
async fn reconfigure_with_same_identity_keeps_connection() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;
    let generation = cache.state().generation;

    cache
        .reconfigure(CollectionIdentity::new("TodoApp", 1, "todos"))
        .await
        .unwrap();

    assert_eq!(cache.state().generation, generation);
}

#[tokio::test]
async fn empty_database_name_fails_open() {
    let backend = MemoryBackend::new();
    let cache: SyncedCollection<Value> =
        SyncedCollection::connect(backend.clone(), CollectionIdentity::new("", 1, "todos")).await;

    assert_eq!(cache.error().map(|e| e.kind()), Some(ErrorKind::OpenFailed));
    assert!(backend.databases().is_empty());
}

// ============================================================================
// Snapshot Edge Cases
// ============================================================================

#[tokio::test]
async fn snapshot_empty_backend() {
    let snapshot = MemoryBackend::new().export_snapshot();
    let metadata = SnapshotMetadata::from(&snapshot);

    assert_eq!(metadata.database_count, 0);
    assert_eq!(metadata.record_count, 0);
    assert!(MemoryBackend::from_snapshot(snapshot).is_ok());
}

#[tokio::test]
async fn snapshot_roundtrip_through_json() {
    let backend = MemoryBackend::new();
    let cache = json_cache(&backend).await;
    cache.add(&json!({"id": 2, "text": "b"})).await.unwrap();
    cache.add(&json!({"id": "a", "text": "a"})).await.unwrap();

    let json = backend.export_snapshot().to_json_pretty().unwrap();
    let restored = MemoryBackend::from_snapshot(BackendSnapshot::from_json(&json).unwrap()).unwrap();
    let reopened = json_cache(&restored).await;

    assert_eq!(reopened.data(), cache.data());
}

#[tokio::test]
async fn snapshot_with_keyless_record_is_rejected() {
    let json = r#"{
        "formatVersion": 1,
        "databases": {
            "TodoApp": {
                "version": 1,
                "stores": {
                    "todos": { "keyPath": "id", "records": [{"text": "no id"}] }
                }
            }
        }
    }"#;
    let snapshot = BackendSnapshot::from_json(json).unwrap();

    assert!(MemoryBackend::from_snapshot(snapshot).is_err());
}

#[tokio::test]
async fn snapshot_with_zero_and_negative_zero_keys_is_rejected() {
    let json = r#"{
        "formatVersion": 1,
        "databases": {
            "TodoApp": {
                "version": 1,
                "stores": {
                    "todos": { "keyPath": "id", "records": [{"id": 0}, {"id": -0.0}] }
                }
            }
        }
    }"#;
    let snapshot = BackendSnapshot::from_json(json).unwrap();

    assert!(MemoryBackend::from_snapshot(snapshot).is_err());
}
