//! Unit tests for both state persister backends.
//!
//! Every behavioural test runs against the in-memory store and an in-memory
//! `SQLite` database, so the two backends cannot drift apart.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use preflight_kit::config::{GlobalConfig, PersistenceBackend, PersistenceConfig};
use preflight_kit::models::execution::ExecutionRecord;
use preflight_kit::persistence::memory::InMemoryStatePersister;
use preflight_kit::persistence::state_repo::SqliteStatePersister;
use preflight_kit::persistence::{self, db, StatePersister};
use preflight_kit::AppError;

async fn backends() -> Vec<(&'static str, Arc<dyn StatePersister>)> {
    let pool = db::connect_memory().await.expect("sqlite memory db");
    vec![
        ("memory", Arc::new(InMemoryStatePersister::new())),
        ("sqlite", Arc::new(SqliteStatePersister::new(Arc::new(pool)))),
    ]
}

fn record(check_id: &str, state: serde_json::Value) -> ExecutionRecord {
    ExecutionRecord::new(Uuid::new_v4(), check_id.to_owned(), state)
}

#[tokio::test]
async fn persist_then_get_returns_record() {
    for (name, store) in backends().await {
        let original = record("disk-check", json!({ "step": "init", "nested": { "n": [1, 2] } }));

        store.persist(&original).await.expect("persist");
        let loaded = store.get(original.execution_id).await.expect("get");

        assert_eq!(loaded.execution_id, original.execution_id, "{name}");
        assert_eq!(loaded.check_id, "disk-check", "{name}");
        assert_eq!(loaded.state, original.state, "{name}");
        assert_eq!(
            loaded.created_at.timestamp_millis(),
            original.created_at.timestamp_millis(),
            "{name}"
        );
    }
}

#[tokio::test]
async fn persist_replaces_state_wholesale() {
    for (name, store) in backends().await {
        let original = record("disk-check", json!({ "step": "init", "extra": true }));
        store.persist(&original).await.expect("persist");

        let updated = original.with_state(json!({ "step": "checking" }));
        store.persist(&updated).await.expect("upsert");

        let loaded = store.get(original.execution_id).await.expect("get");
        assert_eq!(loaded.state, json!({ "step": "checking" }), "{name}: no merge");
    }
}

#[tokio::test]
async fn get_missing_is_state_not_found() {
    for (name, store) in backends().await {
        let result = store.get(Uuid::new_v4()).await;
        assert!(
            matches!(result, Err(AppError::StateNotFound(_))),
            "{name}: {result:?}"
        );
    }
}

#[tokio::test]
async fn delete_is_idempotent() {
    for (name, store) in backends().await {
        let original = record("disk-check", json!({}));
        store.persist(&original).await.expect("persist");

        store.delete(original.execution_id).await.expect("delete");
        store
            .delete(original.execution_id)
            .await
            .unwrap_or_else(|err| panic!("{name}: second delete failed: {err}"));

        assert!(store.get(original.execution_id).await.is_err(), "{name}");
    }
}

#[tokio::test]
async fn list_ids_tracks_live_records() {
    for (name, store) in backends().await {
        let first = record("a", json!({}));
        let second = record("b", json!({}));
        store.persist(&first).await.expect("persist first");
        store.persist(&second).await.expect("persist second");
        store.delete(first.execution_id).await.expect("delete");

        let ids = store.list_ids().await.expect("list");
        assert_eq!(ids, vec![second.execution_id], "{name}");
    }
}

#[tokio::test]
async fn concurrent_writers_on_distinct_ids() {
    let store = Arc::new(InMemoryStatePersister::new());
    let mut handles = Vec::new();
    for n in 0..32 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let rec = record("disk-check", json!({ "n": n }));
            store.persist(&rec).await.expect("persist");
            let loaded = store.get(rec.execution_id).await.expect("get");
            assert_eq!(loaded.state["n"], n);
        }));
    }
    for handle in handles {
        handle.await.expect("task");
    }
    assert_eq!(store.len(), 32);
}

#[tokio::test]
async fn from_config_opens_sqlite_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = GlobalConfig {
        persistence: PersistenceConfig {
            backend: PersistenceBackend::Sqlite,
            db_path: Some(dir.path().join("nested").join("state.db")),
        },
        ..GlobalConfig::default()
    };

    let store = persistence::from_config(&config).await.expect("open");
    let rec = record("disk-check", json!({ "step": "init" }));
    store.persist(&rec).await.expect("persist");

    assert!(dir.path().join("nested").join("state.db").exists());
    assert_eq!(store.get(rec.execution_id).await.expect("get").state["step"], "init");
}

#[tokio::test]
async fn from_config_defaults_to_memory() {
    let store = persistence::from_config(&GlobalConfig::default())
        .await
        .expect("memory store");
    assert!(store.list_ids().await.expect("list").is_empty());
}
