use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

type Action<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// Trailing-edge debouncer: runs `action` once `delay` has passed without a new
/// call, with the argument of the most recent call.
///
/// Only the wait is cancellable. Once the delay elapses the action is spawned
/// as its own task, so a later `call` or `cancel` never interrupts it.
pub struct Debouncer<T> {
    delay: Duration,
    action: Action<T>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            action: Arc::new(move |arg| action(arg).boxed()),
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// (Re)starts the quiet period. Outside a tokio runtime the call is dropped
    /// with a warning.
    pub fn call(&self, arg: T) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime available; debounced call dropped");
            return;
        };
        let action = Arc::clone(&self.action);
        let delay = self.delay;
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // No await between here and the spawn: an abort can no longer land.
            tokio::spawn(action(arg));
        });

        if let Some(previous) = self.pending().replace(timer) {
            previous.abort();
        }
    }

    /// Drops the pending call, if any, without running it.
    pub fn cancel(&self) {
        if let Some(timer) = self.pending().take() {
            timer.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending()
            .as_ref()
            .map_or(false, |timer| !timer.is_finished())
    }

    fn pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(timer) = pending.take() {
            timer.abort();
        }
    }
}
