use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::debounce::Debouncer;
use super::event::{SaveOutcome, SaveTriggerReason};
use super::executor::SaveExecutor;
use super::observer::SaveObserver;
use super::telemetry::metrics::TelemetrySnapshot;
use crate::config::SchedulerConfig;
use crate::snapshot::StateProvider;
use crate::storage::{PersistentStore, SaveKey, SaveRecord, StoreError};

/// What a trigger turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The save ran to completion before `trigger_save` returned.
    Completed(SaveOutcome),
    /// Handed to the debouncer; the outcome goes to the observer.
    Debounced,
}

/// Routes triggers either straight to the executor or through the debouncer.
#[derive(Clone)]
struct TriggerRouter {
    executor: Arc<SaveExecutor>,
    // None when debouncing is disabled (debounce_ms == 0).
    debouncer: Option<Arc<Debouncer<(SaveTriggerReason, u64)>>>,
}

impl TriggerRouter {
    /// `generation` is the executor generation at the moment the trigger was
    /// issued, so a stop between dispatch and execution silences the save.
    async fn route(&self, reason: SaveTriggerReason, generation: u64) -> Dispatch {
        match &self.debouncer {
            Some(debouncer) if !reason.is_manual() && self.executor.is_current(generation) => {
                debouncer.call((reason, generation));
                Dispatch::Debounced
            }
            _ => Dispatch::Completed(self.executor.run_as_of(reason, generation).await),
        }
    }

    fn cancel_pending(&self) {
        if let Some(debouncer) = &self.debouncer {
            debouncer.cancel();
        }
    }

    fn has_pending(&self) -> bool {
        self.debouncer.as_ref().map_or(false, |d| d.is_pending())
    }
}

enum Lifecycle {
    Stopped,
    Running { shutdown: CancellationToken },
}

/// Owns the periodic timer and the start/stop lifecycle, and is the single
/// entry point for save triggers.
///
/// `start` spawns onto the current tokio runtime. Triggers are accepted in
/// either state, so a manual save works without ever starting the timer.
pub struct AutoSaveScheduler {
    config: SchedulerConfig,
    router: TriggerRouter,
    lifecycle: Mutex<Lifecycle>,
}

impl AutoSaveScheduler {
    pub fn new(
        config: SchedulerConfig,
        provider: Arc<dyn StateProvider>,
        store: Arc<dyn PersistentStore>,
        observer: Arc<dyn SaveObserver>,
    ) -> Self {
        let executor = Arc::new(SaveExecutor::new(config.clone(), provider, store, observer));

        let debouncer = if config.debounce_ms == 0 {
            None
        } else {
            let target = Arc::clone(&executor);
            Some(Arc::new(Debouncer::new(config.debounce(), move |(reason, generation)| {
                let executor = Arc::clone(&target);
                async move {
                    executor.run_as_of(reason, generation).await;
                }
            })))
        };

        Self {
            config,
            router: TriggerRouter { executor, debouncer },
            lifecycle: Mutex::new(Lifecycle::Stopped),
        }
    }

    /// Arms the periodic timer on the current tokio runtime. Outside a runtime
    /// it logs a warning and stays stopped.
    pub fn start(&self) {
        let mut lifecycle = self.lifecycle();
        if matches!(*lifecycle, Lifecycle::Running { .. }) {
            warn!("Auto-save scheduler already running; start ignored");
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime available; auto-save scheduler not started");
            return;
        };

        let shutdown = CancellationToken::new();
        let cancelled = shutdown.clone();
        let router = self.router.clone();
        let period = self.config.interval();

        runtime.spawn(async move {
            let mut cadence = interval_at(Instant::now() + period, period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = cadence.tick() => {
                        let generation = router.executor.generation();
                        // Detached so a stop never aborts a save mid-write.
                        let router = router.clone();
                        tokio::spawn(async move {
                            router.route(SaveTriggerReason::Periodic, generation).await;
                        });
                    }
                }
            }
            debug!("Periodic save timer exited");
        });

        *lifecycle = Lifecycle::Running { shutdown };
        info!("Auto-save scheduler started. Interval: {}ms, debounce: {}ms", self.config.interval_ms, self.config.debounce_ms);
    }

    /// Cancels the timer and any pending debounced save, and forgets retry state.
    /// Writes already in flight finish, but their outcomes are not reported.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle();
        // Triggers are accepted while stopped, so a pending call can exist in either state.
        self.router.cancel_pending();
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Stopped => debug!("Auto-save scheduler already stopped"),
            Lifecycle::Running { shutdown } => {
                shutdown.cancel();
                self.router.executor.retries().clear();
                self.router.executor.invalidate();
                info!("Auto-save scheduler stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle(), Lifecycle::Running { .. })
    }

    pub async fn trigger_save(&self, reason: SaveTriggerReason) -> Dispatch {
        debug!("Save trigger: {}", reason);
        let generation = self.router.executor.generation();
        self.router.route(reason, generation).await
    }

    pub fn has_pending_save(&self) -> bool {
        self.router.has_pending()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<SaveExecutor> {
        &self.router.executor
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.router.executor.telemetry()
    }

    pub async fn saves(&self, session_id: &str) -> Result<Vec<SaveKey>, StoreError> {
        self.router.executor.catalog().list(session_id).await
    }

    pub async fn load_latest(&self, session_id: &str) -> Result<Option<(SaveKey, SaveRecord)>, StoreError> {
        self.router.executor.catalog().latest(session_id).await
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
