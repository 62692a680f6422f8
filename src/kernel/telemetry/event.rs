use serde::{Deserialize, Serialize};

use crate::kernel::classify::ErrorKind;
use crate::kernel::event::SaveTriggerReason;
use crate::snapshot::SessionStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    /// A run started, before the snapshot was fetched.
    Requested {
        reason: SaveTriggerReason,
    },

    Skipped {
        reason: SaveTriggerReason,
        status: SessionStatus,
    },

    Reduced {
        original_bytes: usize,
        reduced_bytes: usize,
    },

    Retried {
        reason: SaveTriggerReason,
        attempt: u32,
        delay_ms: u64,
        kind: ErrorKind,
    },

    Saved {
        reason: SaveTriggerReason,
        size: usize,
        duration_ms: u64,
        attempts: u32,
    },

    Failed {
        reason: SaveTriggerReason,
        stage: FailureStage,
        kind: ErrorKind,
        attempts: u32,
    },

    /// Outcome dropped because the scheduler was stopped while the run was in flight.
    Discarded {
        reason: SaveTriggerReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStage {
    Provider,
    Serialize,
    Write,
}
