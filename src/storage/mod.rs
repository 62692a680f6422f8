pub mod key;
pub mod memory;
pub mod file;
pub mod catalog;

pub use key::*;
pub use memory::*;
pub use file::*;
pub use catalog::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::snapshot::GameStateSnapshot;

/// Format version written alongside every snapshot.
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the value itself; writing it again will not help.
    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

/// Value stored under a save key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub state: GameStateSnapshot,
    pub version: u32,
}

impl SaveRecord {
    pub fn new(state: GameStateSnapshot) -> Self {
        Self {
            state,
            version: RECORD_VERSION,
        }
    }
}

/// Durable asynchronous blob store the engine persists into.
///
/// Implementations must be safe to call from several save chains at once.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn set_item(&self, key: &str, value: &SaveRecord) -> Result<(), StoreError>;

    async fn get_item(&self, key: &str) -> Result<Option<SaveRecord>, StoreError>;

    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, in no particular order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
