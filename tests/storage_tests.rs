use std::sync::Arc;

use autosave::snapshot::{GameStateSnapshot, SessionRecord, SessionStatus};
use autosave::storage::{FileStore, InMemoryStore, PersistentStore, SaveCatalog, SaveKey, SaveRecord, StoreError};
use serde_json::json;

fn record(session: &str, scene: &str) -> SaveRecord {
    let mut state = GameStateSnapshot::new(SessionRecord::new(session, SessionStatus::Active));
    state.world = Some(json!({ "id": "w1", "name": "Ashfall", "scene": scene }));
    SaveRecord::new(state)
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("saves"));
    let key = SaveKey::new("s1", 1_000).to_string();

    // Missing directory and missing key both read as empty.
    assert!(store.get_item(&key).await.unwrap().is_none());
    assert!(store.keys("auto-save-").await.unwrap().is_empty());

    let value = record("s1", "prologue");
    store.set_item(&key, &value).await.unwrap();
    assert_eq!(store.get_item(&key).await.unwrap(), Some(value));
    assert!(dir.path().join("saves").join(format!("{}.json", key)).exists());

    store.remove_item(&key).await.unwrap();
    assert!(store.get_item(&key).await.unwrap().is_none());
    // Removing twice is fine.
    store.remove_item(&key).await.unwrap();
}

#[tokio::test]
async fn test_file_store_lists_by_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    for (session, at) in [("s1", 1), ("s1", 2), ("s2", 3)] {
        let key = SaveKey::new(session, at).to_string();
        store.set_item(&key, &record(session, "x")).await.unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut keys = store.keys(&SaveKey::session_prefix("s1")).await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["auto-save-s1-1", "auto-save-s1-2"]);
    assert_eq!(store.keys("auto-save-").await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_store_concurrent_writes_to_one_key() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let key = SaveKey::new("s1", 7).to_string();
    store.set_item(&key, &record("s1", "seed")).await.unwrap();

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            let key = key.clone();
            tokio::spawn(async move { store.set_item(&key, &record("s1", &i.to_string())).await })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    assert!(store.get_item(&key).await.unwrap().is_some());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
}

#[tokio::test]
async fn test_file_store_rejects_path_like_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    for key in ["", "../escape", "a/b", ".hidden"] {
        let err = store.set_item(key, &record("s1", "x")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)), "key {:?} gave {:?}", key, err);
    }
}

#[tokio::test]
async fn test_file_store_keeps_unknown_snapshot_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let raw = json!({
        "state": {
            "session": { "id": "s1", "status": "active", "turn": 12 },
            "inventory": ["lamp"]
        },
        "version": 1
    });
    std::fs::write(dir.path().join("auto-save-s1-5.json"), raw.to_string()).unwrap();

    let loaded = store.get_item("auto-save-s1-5").await.unwrap().unwrap();
    assert_eq!(loaded.state.session.extra.get("turn"), Some(&json!(12)));
    assert_eq!(loaded.state.extra.get("inventory"), Some(&json!(["lamp"])));
    assert_eq!(serde_json::to_value(&loaded).unwrap(), raw);
}

#[tokio::test]
async fn test_catalog_latest_and_prune() {
    let store = InMemoryStore::new();
    for (session, at) in [("s1", 30), ("s1", 10), ("s1", 20), ("s1-b", 40)] {
        let key = SaveKey::new(session, at).to_string();
        store.set_item(&key, &record(session, &at.to_string())).await.unwrap();
    }
    let catalog = SaveCatalog::new(&store);

    // "s1-b" shares the prefix but is a different session.
    let listed: Vec<u64> = catalog.list("s1").await.unwrap().iter().map(|k| k.saved_at).collect();
    assert_eq!(listed, vec![10, 20, 30]);

    let (key, latest) = catalog.latest("s1").await.unwrap().unwrap();
    assert_eq!(key, SaveKey::new("s1", 30));
    assert_eq!(latest.state.world.unwrap()["scene"], "30");

    assert_eq!(catalog.prune("s1", 1).await.unwrap(), 2);
    assert_eq!(catalog.prune("s1", 1).await.unwrap(), 0);
    assert_eq!(catalog.list("s1").await.unwrap(), vec![SaveKey::new("s1", 30)]);
    assert_eq!(catalog.list("s1-b").await.unwrap().len(), 1);
    assert!(catalog.latest("nobody").await.unwrap().is_none());
}
