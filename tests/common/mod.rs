#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map};
use tokio::sync::mpsc;
use tokio::time::Instant;

use autosave::snapshot::{GameStateSnapshot, Narrative, SessionRecord, SessionStatus, StateProvider};
use autosave::storage::{InMemoryStore, PersistentStore, SaveRecord, StoreError};
use autosave::SaveEvent;

/// Provider returning a fixed snapshot whose status tests can flip.
pub struct FixedProvider {
    snapshot: Mutex<GameStateSnapshot>,
    calls: AtomicUsize,
}

impl FixedProvider {
    pub fn new(snapshot: GameStateSnapshot) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(snapshot),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn session(id: &str, status: SessionStatus) -> Arc<Self> {
        Self::new(GameStateSnapshot::new(SessionRecord::new(id, status)))
    }

    pub fn set_status(&self, status: SessionStatus) {
        self.snapshot.lock().unwrap().session.status = status;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateProvider for FixedProvider {
    async fn snapshot(&self) -> anyhow::Result<GameStateSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

pub struct FailingProvider(pub &'static str);

#[async_trait]
impl StateProvider for FailingProvider {
    async fn snapshot(&self) -> anyhow::Result<GameStateSnapshot> {
        Err(anyhow::anyhow!(self.0))
    }
}

/// In-memory store that fails the first writes with queued errors and
/// remembers when every write was attempted.
#[derive(Default)]
pub struct ScriptedStore {
    inner: InMemoryStore,
    failures: Mutex<VecDeque<StoreError>>,
    attempts: Mutex<Vec<(String, Instant, SaveRecord)>>,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_with(errors: Vec<StoreError>) -> Arc<Self> {
        let store = Self::default();
        *store.failures.lock().unwrap() = errors.into();
        Arc::new(store)
    }

    pub fn set_calls(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().iter().map(|(_, at, _)| *at).collect()
    }

    pub fn last_record(&self) -> Option<SaveRecord> {
        self.attempts.lock().unwrap().last().map(|(_, _, record)| record.clone())
    }

    pub fn stored(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl PersistentStore for ScriptedStore {
    async fn set_item(&self, key: &str, value: &SaveRecord) -> Result<(), StoreError> {
        self.attempts
            .lock()
            .unwrap()
            .push((key.to_string(), Instant::now(), value.clone()));
        let scripted = self.failures.lock().unwrap().pop_front();
        match scripted {
            Some(err) => Err(err),
            None => self.inner.set_item(key, value).await,
        }
    }

    async fn get_item(&self, key: &str) -> Result<Option<SaveRecord>, StoreError> {
        self.inner.get_item(key).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove_item(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(prefix).await
    }
}

pub fn observer() -> (Arc<mpsc::UnboundedSender<SaveEvent>>, mpsc::UnboundedReceiver<SaveEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(tx), rx)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<SaveEvent>) -> Vec<SaveEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Active session with a long narrative and a heavy world, well above 1 KB.
pub fn heavy_snapshot(id: &str) -> GameStateSnapshot {
    let mut snap = GameStateSnapshot::new(SessionRecord::new(id, SessionStatus::Active));
    snap.world = Some(json!({ "id": "w1", "name": "Ashfall", "atlas": "x".repeat(5_000) }));
    snap.character = Some(json!({ "name": "Vel" }));
    snap.narrative = Some(Narrative {
        entries: (0..40).map(|i| json!({ "seq": i, "text": "y".repeat(50) })).collect(),
        extra: Map::new(),
    });
    snap.journal = Some(json!(["entry"]));
    snap
}

pub fn network_error() -> StoreError {
    StoreError::Unavailable("network unreachable".into())
}
