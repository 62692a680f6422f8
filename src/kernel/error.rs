use super::classify::{classify, Classification};
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The state provider could not produce a snapshot. Never retried here.
    #[error("state provider failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("snapshot could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("write failed after {attempts} attempt(s): {source}")]
    Write {
        attempts: u32,
        classification: Classification,
        #[source]
        source: StoreError,
    },
}

impl SaveError {
    pub fn classification(&self) -> Classification {
        match self {
            SaveError::Provider(source) => classify(&**source),
            SaveError::Serialize(source) => classify(source),
            SaveError::Write { classification, .. } => classification.clone(),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            SaveError::Write { attempts, .. } => *attempts,
            _ => 0,
        }
    }
}
