use std::fmt;

use serde::{Deserialize, Serialize};

use super::classify::{ErrorKind, UserFriendlyError};
use super::error::SaveError;
use crate::snapshot::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveTriggerReason {
    Periodic,
    PlayerChoice,
    SceneChange,
    Manual,
}

impl SaveTriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaveTriggerReason::Periodic => "periodic",
            SaveTriggerReason::PlayerChoice => "player-choice",
            SaveTriggerReason::SceneChange => "scene-change",
            SaveTriggerReason::Manual => "manual",
        }
    }

    /// Manual saves skip the debouncer and the inactive-session check.
    pub fn is_manual(&self) -> bool {
        matches!(self, SaveTriggerReason::Manual)
    }
}

impl fmt::Display for SaveTriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted once a write has been confirmed by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    pub success: bool,
    /// Epoch milliseconds of the confirmed write.
    pub timestamp: u64,
    pub reason: SaveTriggerReason,
    /// Serialized size of the snapshot as captured, before any reduction.
    pub size: usize,
    /// Milliseconds from the start of the run to the confirmed write.
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_friendly_message: Option<String>,
    pub key: String,
    /// Total writes, including the successful one.
    pub attempts: u32,
    pub reduced: bool,
}

/// Terminal failure as handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFailure {
    pub reason: SaveTriggerReason,
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub user_friendly_error: UserFriendlyError,
    /// Writes performed before giving up. 0 when the snapshot was never obtained.
    pub attempts: u32,
}

impl SaveFailure {
    pub fn from_error(reason: SaveTriggerReason, error: &SaveError) -> Self {
        let classification = error.classification();
        Self {
            reason,
            kind: classification.kind,
            message: error.to_string(),
            retryable: classification.retryable,
            user_friendly_error: classification.user_friendly_error,
            attempts: error.attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(SaveResult),
    /// Inactive session on a non-manual trigger. Nothing was written or reported.
    Skipped(SessionStatus),
    Failed(SaveFailure),
    /// Dispatched before a stop and picked up after it. Nothing was written or reported.
    Discarded,
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }
}

/// Observer-facing lifecycle events, for consumers that prefer a channel to callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveEvent {
    Saved(SaveResult),
    Failed(SaveFailure),
}
