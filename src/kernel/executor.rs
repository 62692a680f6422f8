use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::classify::classify;
use super::error::SaveError;
use super::event::{SaveFailure, SaveOutcome, SaveResult, SaveTriggerReason};
use super::observer::SaveObserver;
use super::retry::{Backoff, OperationId, RetryDecision, RetryRegistry};
use super::telemetry::event::{FailureStage, TelemetryEvent};
use super::telemetry::metrics::TelemetrySnapshot;
use super::telemetry::recorder::TelemetryRecorder;
use super::time::epoch_millis;
use crate::config::SchedulerConfig;
use crate::snapshot::{reduce, GameStateSnapshot, StateProvider};
use crate::storage::{PersistentStore, SaveCatalog, SaveKey, SaveRecord};

/// Runs one logical save per `run` call: fetch, measure, reduce, write, retry.
///
/// Several runs may be in flight at once. Each one writes under its own
/// timestamped key, so they never overwrite each other's record.
pub struct SaveExecutor {
    config: SchedulerConfig,
    backoff: Backoff,
    provider: Arc<dyn StateProvider>,
    store: Arc<dyn PersistentStore>,
    observer: Arc<dyn SaveObserver>,
    retries: RetryRegistry,
    telemetry: Mutex<TelemetryRecorder>,
    // Bumped by the scheduler on stop; runs that began under an older value stay silent.
    generation: AtomicU64,
}

/// Per-run values threaded through the write phase.
struct RunContext {
    op: OperationId,
    reason: SaveTriggerReason,
    generation: u64,
    started: Instant,
    size: usize,
    reduced: bool,
}

impl SaveExecutor {
    pub fn new(
        config: SchedulerConfig,
        provider: Arc<dyn StateProvider>,
        store: Arc<dyn PersistentStore>,
        observer: Arc<dyn SaveObserver>,
    ) -> Self {
        Self {
            backoff: Backoff::new(config.max_retries),
            config,
            provider,
            store,
            observer,
            retries: RetryRegistry::new(),
            telemetry: Mutex::new(TelemetryRecorder::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn retries(&self) -> &RetryRegistry {
        &self.retries
    }

    pub fn catalog(&self) -> SaveCatalog<'_> {
        SaveCatalog::new(self.store.as_ref())
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.recorder().snapshot()
    }

    /// Outcomes of runs dispatched before this call are no longer reported.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Current lifecycle generation. Capture it when a save is dispatched and
    /// hand it to [`SaveExecutor::run_as_of`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    pub async fn run(&self, reason: SaveTriggerReason) -> SaveOutcome {
        self.run_as_of(reason, self.generation()).await
    }

    /// Runs a save dispatched under `generation`. If the scheduler was stopped
    /// since, nothing is fetched or written.
    pub async fn run_as_of(&self, reason: SaveTriggerReason, generation: u64) -> SaveOutcome {
        if !self.is_current(generation) {
            self.discard(reason);
            return SaveOutcome::Discarded;
        }

        let started = Instant::now();
        let op = OperationId::new(reason);
        self.record(TelemetryEvent::Requested { reason });
        debug!("Save {} requested", op);

        // 1. Capture
        let snapshot = match self.provider.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return self.fail(reason, generation, FailureStage::Provider, SaveError::Provider(e));
            }
        };

        // 2. Skip inactive sessions unless the player asked for it
        let status = snapshot.session.status;
        if !reason.is_manual() && status.is_inactive() {
            debug!("Save {} skipped: session {} is {:?}", op, snapshot.session.id, status);
            self.record(TelemetryEvent::Skipped { reason, status });
            return SaveOutcome::Skipped(status);
        }

        // 3. Measure + reduce
        let size = match snapshot.serialized_size() {
            Ok(size) => size,
            Err(e) => return self.fail(reason, generation, FailureStage::Serialize, e.into()),
        };
        let (record, reduced) = match self.prepare(snapshot, size) {
            Ok(prepared) => prepared,
            Err(e) => return self.fail(reason, generation, FailureStage::Serialize, e.into()),
        };

        // 4. Write with retries
        let ctx = RunContext {
            op,
            reason,
            generation,
            started,
            size,
            reduced,
        };
        self.write(ctx, record).await
    }

    fn prepare(&self, snapshot: GameStateSnapshot, size: usize) -> Result<(SaveRecord, bool), serde_json::Error> {
        let threshold = self.config.size_threshold_bytes;
        if !self.config.compression_enabled || size <= threshold {
            return Ok((SaveRecord::new(snapshot), false));
        }

        let reduced = match reduce(&snapshot, threshold)? {
            Cow::Owned(reduced) => Some(reduced),
            Cow::Borrowed(_) => None,
        };
        match reduced {
            Some(reduced) => {
                let reduced_size = reduced.serialized_size()?;
                info!("Reduced snapshot from {} to {} bytes", size, reduced_size);
                self.record(TelemetryEvent::Reduced {
                    original_bytes: size,
                    reduced_bytes: reduced_size,
                });
                Ok((SaveRecord::new(reduced), true))
            }
            None => Ok((SaveRecord::new(snapshot), false)),
        }
    }

    async fn write(&self, ctx: RunContext, record: SaveRecord) -> SaveOutcome {
        let session_id = record.state.session.id.clone();
        let mut guard = self.retries.track(ctx.op.clone());

        loop {
            let key = SaveKey::new(&session_id, epoch_millis()).to_string();

            let err = match self.store.set_item(&key, &record).await {
                Ok(()) => {
                    let attempts = guard.attempts() + 1;
                    drop(guard);
                    return self.succeed(&ctx, &session_id, key, attempts).await;
                }
                Err(err) => err,
            };

            let classification = classify(&err);
            match self.backoff.decide(guard.attempts(), &classification) {
                RetryDecision::RetryAfter(delay) => {
                    let attempt = guard.record_retry(classification.kind);
                    warn!(
                        "Save {} failed ({}), retry {}/{} in {:?}: {}",
                        ctx.op, classification.kind, attempt, self.backoff.max_retries, delay, err
                    );
                    self.record(TelemetryEvent::Retried {
                        reason: ctx.reason,
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                        kind: classification.kind,
                    });
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp(why) => {
                    let attempts = guard.attempts() + 1;
                    drop(guard);
                    debug!("Save {} giving up: {:?}", ctx.op, why);
                    let error = SaveError::Write {
                        attempts,
                        classification,
                        source: err,
                    };
                    return self.fail(ctx.reason, ctx.generation, FailureStage::Write, error);
                }
            }
        }
    }

    async fn succeed(&self, ctx: &RunContext, session_id: &str, key: String, attempts: u32) -> SaveOutcome {
        let duration = ctx.started.elapsed().as_millis() as u64;
        let result = SaveResult {
            success: true,
            timestamp: epoch_millis(),
            reason: ctx.reason,
            size: ctx.size,
            duration,
            retryable: None,
            user_friendly_message: None,
            key,
            attempts,
            reduced: ctx.reduced,
        };

        info!(
            "Saved {} ({}, {} bytes, {}ms, {} attempt(s))",
            result.key, ctx.reason, ctx.size, duration, attempts
        );
        self.record(TelemetryEvent::Saved {
            reason: ctx.reason,
            size: ctx.size,
            duration_ms: duration,
            attempts,
        });

        if self.is_current(ctx.generation) {
            self.observer.on_save(&result);
        } else {
            self.discard(ctx.reason);
        }

        if self.config.retain_per_session > 0 {
            if let Err(e) = self.catalog().prune(session_id, self.config.retain_per_session).await {
                warn!("Failed to prune old saves for session {}: {}", session_id, e);
            }
        }

        SaveOutcome::Saved(result)
    }

    fn fail(&self, reason: SaveTriggerReason, generation: u64, stage: FailureStage, error: SaveError) -> SaveOutcome {
        let failure = SaveFailure::from_error(reason, &error);
        error!("Save ({}) failed at {:?}: {}", reason, stage, error);
        self.record(TelemetryEvent::Failed {
            reason,
            stage,
            kind: failure.kind,
            attempts: failure.attempts,
        });

        if self.is_current(generation) {
            self.observer.on_error(&failure);
        } else {
            self.discard(reason);
        }

        SaveOutcome::Failed(failure)
    }

    fn discard(&self, reason: SaveTriggerReason) {
        debug!("Scheduler stopped around {} save; outcome not reported", reason);
        self.record(TelemetryEvent::Discarded { reason });
    }

    fn record(&self, event: TelemetryEvent) {
        self.recorder().record(event);
    }

    fn recorder(&self) -> MutexGuard<'_, TelemetryRecorder> {
        self.telemetry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
