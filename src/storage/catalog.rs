use tracing::debug;

use super::{PersistentStore, SaveKey, SaveRecord, StoreError};

/// Read-side view over the saves of each session.
pub struct SaveCatalog<'a> {
    store: &'a dyn PersistentStore,
}

impl<'a> SaveCatalog<'a> {
    pub fn new(store: &'a dyn PersistentStore) -> Self {
        Self { store }
    }

    /// Saves of `session_id`, oldest first. Keys that do not parse are ignored.
    pub async fn list(&self, session_id: &str) -> Result<Vec<SaveKey>, StoreError> {
        let raw = self.store.keys(&SaveKey::session_prefix(session_id)).await?;
        let mut keys: Vec<SaveKey> = raw
            .iter()
            .filter_map(|k| SaveKey::parse(k))
            .filter(|k| k.session_id == session_id)
            .collect();
        keys.sort_by_key(|k| k.saved_at);
        Ok(keys)
    }

    pub async fn latest(&self, session_id: &str) -> Result<Option<(SaveKey, SaveRecord)>, StoreError> {
        // Walk newest to oldest in case a key vanished between listing and reading.
        for key in self.list(session_id).await?.into_iter().rev() {
            if let Some(record) = self.store.get_item(&key.to_string()).await? {
                return Ok(Some((key, record)));
            }
        }
        Ok(None)
    }

    /// Keeps the `keep` newest saves and removes the rest. Returns how many were removed.
    pub async fn prune(&self, session_id: &str, keep: usize) -> Result<usize, StoreError> {
        let keys = self.list(session_id).await?;
        let excess = keys.len().saturating_sub(keep);
        for key in &keys[..excess] {
            self.store.remove_item(&key.to_string()).await?;
        }
        if excess > 0 {
            debug!("Pruned {} old save(s) for session {}", excess, session_id);
        }
        Ok(excess)
    }
}
