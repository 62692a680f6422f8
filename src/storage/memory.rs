use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{PersistentStore, SaveRecord, StoreError};

/// Process-local store. Records are kept as encoded JSON so a write goes through
/// the same serialization path as a durable backend would.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn set_item(&self, key: &str, value: &SaveRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.entries().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<SaveRecord>, StoreError> {
        match self.entries().get(key) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
