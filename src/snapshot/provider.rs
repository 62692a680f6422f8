use async_trait::async_trait;

use super::types::GameStateSnapshot;

/// Source of the state to persist. Called once per save run.
#[async_trait]
pub trait StateProvider: Send + Sync {
    async fn snapshot(&self) -> anyhow::Result<GameStateSnapshot>;
}
