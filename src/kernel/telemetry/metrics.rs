use std::collections::{HashMap, VecDeque};

use super::event::{FailureStage, TelemetryEvent};
use crate::kernel::classify::ErrorKind;
use crate::kernel::event::SaveTriggerReason;

#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub save_stats: SaveStats,
    pub retry_stats: RetryStats,
    pub reduction_stats: ReductionStats,
    pub failure_stats: FailureStats,
    pub requests_by_reason: HashMap<SaveTriggerReason, u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SaveStats {
    pub requested: u64,
    pub saved: u64,
    pub skipped: u64,
    pub discarded: u64,
    pub total_bytes: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub retries: u64,
    pub total_backoff_ms: u64,
    /// Saves that needed at least one retry before succeeding.
    pub recovered: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ReductionStats {
    pub count: u64,
    pub bytes_trimmed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct FailureStats {
    pub total: u64,
    pub provider: u64,
    pub serialize: u64,
    pub write: u64,
    pub by_kind: HashMap<ErrorKind, u64>,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();
    let mut total_duration_ms = 0u64;

    for event in events {
        match event {
            TelemetryEvent::Requested { reason } => {
                snap.save_stats.requested += 1;
                *snap.requests_by_reason.entry(*reason).or_insert(0) += 1;
            }
            TelemetryEvent::Skipped { .. } => snap.save_stats.skipped += 1,
            TelemetryEvent::Reduced { original_bytes, reduced_bytes } => {
                snap.reduction_stats.count += 1;
                snap.reduction_stats.bytes_trimmed += original_bytes.saturating_sub(*reduced_bytes) as u64;
            }
            TelemetryEvent::Retried { delay_ms, .. } => {
                snap.retry_stats.retries += 1;
                snap.retry_stats.total_backoff_ms += delay_ms;
            }
            TelemetryEvent::Saved { size, duration_ms, attempts, .. } => {
                snap.save_stats.saved += 1;
                snap.save_stats.total_bytes += *size as u64;
                snap.save_stats.max_duration_ms = snap.save_stats.max_duration_ms.max(*duration_ms);
                total_duration_ms += duration_ms;
                if *attempts > 1 {
                    snap.retry_stats.recovered += 1;
                }
            }
            TelemetryEvent::Failed { stage, kind, .. } => {
                snap.failure_stats.total += 1;
                match stage {
                    FailureStage::Provider => snap.failure_stats.provider += 1,
                    FailureStage::Serialize => snap.failure_stats.serialize += 1,
                    FailureStage::Write => snap.failure_stats.write += 1,
                }
                *snap.failure_stats.by_kind.entry(*kind).or_insert(0) += 1;
            }
            TelemetryEvent::Discarded { .. } => snap.save_stats.discarded += 1,
        }
    }

    if snap.save_stats.saved > 0 {
        snap.save_stats.avg_duration_ms = total_duration_ms as f64 / snap.save_stats.saved as f64;
    }

    snap
}
