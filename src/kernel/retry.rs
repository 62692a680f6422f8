use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::classify::{Classification, ErrorKind};
use super::event::SaveTriggerReason;
use super::time::{backoff_delay, epoch_millis};

static OPERATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identifies one attempt chain: `{reason}-{epoch_millis}-{seq}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(reason: SaveTriggerReason) -> Self {
        let seq = OPERATION_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{}-{}", reason, epoch_millis(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Retries performed so far in this chain.
    pub attempts: u32,
    pub last_kind: ErrorKind,
}

/// Retry bookkeeping for every attempt chain currently in flight.
#[derive(Debug, Default)]
pub struct RetryRegistry {
    chains: Mutex<HashMap<OperationId, RetryState>>,
    // Bumped by `clear`; chains tracked under an older epoch stop publishing.
    epoch: AtomicU64,
}

impl RetryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `op`. The entry is created lazily on the first failure
    /// and removed when the guard is dropped, whichever way the chain ends.
    pub fn track(&self, op: OperationId) -> RetryGuard<'_> {
        RetryGuard {
            registry: self,
            op,
            attempts: 0,
            epoch: self.epoch.load(Ordering::SeqCst),
        }
    }

    pub fn get(&self, op: &OperationId) -> Option<RetryState> {
        self.chains().get(op).copied()
    }

    pub fn len(&self) -> usize {
        self.chains().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains().is_empty()
    }

    /// Forgets every entry. Chains still running keep counting their own
    /// attempts but are not listed here again.
    pub fn clear(&self) {
        let mut chains = self.chains();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        chains.clear();
    }

    fn chains(&self) -> MutexGuard<'_, HashMap<OperationId, RetryState>> {
        self.chains.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct RetryGuard<'a> {
    registry: &'a RetryRegistry,
    op: OperationId,
    // Authoritative count; the registry entry mirrors it and may be cleared by a stop.
    attempts: u32,
    epoch: u64,
}

impl RetryGuard<'_> {
    pub fn op(&self) -> &OperationId {
        &self.op
    }

    /// Retries recorded for this chain so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records one more retry and returns the updated count.
    pub fn record_retry(&mut self, kind: ErrorKind) -> u32 {
        self.attempts += 1;
        let mut chains = self.registry.chains();
        if self.registry.epoch.load(Ordering::SeqCst) == self.epoch {
            chains.insert(
                self.op.clone(),
                RetryState {
                    attempts: self.attempts,
                    last_kind: kind,
                },
            );
        }
        self.attempts
    }
}

impl Drop for RetryGuard<'_> {
    fn drop(&mut self) {
        self.registry.chains().remove(&self.op);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp(GiveUpReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    NotRetryable,
    Exhausted,
}

/// Exponential backoff bounded by `max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_retries: u32,
}

impl Backoff {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Next step after a failed write, given the retries already made.
    pub fn decide(&self, retries_so_far: u32, classification: &Classification) -> RetryDecision {
        if !classification.retryable {
            RetryDecision::GiveUp(GiveUpReason::NotRetryable)
        } else if retries_so_far >= self.max_retries {
            RetryDecision::GiveUp(GiveUpReason::Exhausted)
        } else {
            RetryDecision::RetryAfter(backoff_delay(retries_so_far))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::classify::classify_message;

    #[test]
    fn guard_removes_entry_on_drop() {
        let registry = RetryRegistry::new();
        let op = OperationId::new(SaveTriggerReason::Periodic);
        {
            let mut guard = registry.track(op.clone());
            assert!(registry.is_empty(), "entry is created on first failure only");
            assert_eq!(guard.record_retry(ErrorKind::Network), 1);
            assert_eq!(guard.record_retry(ErrorKind::Timeout), 2);
            assert_eq!(registry.get(&op).unwrap().last_kind, ErrorKind::Timeout);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn distinct_chains_do_not_collide() {
        let registry = RetryRegistry::new();
        let mut a = registry.track(OperationId::new(SaveTriggerReason::Manual));
        let b = registry.track(OperationId::new(SaveTriggerReason::Manual));
        a.record_retry(ErrorKind::Network);
        assert_eq!(a.attempts(), 1);
        assert_eq!(b.attempts(), 0);
        assert_ne!(a.op(), b.op());
    }

    #[test]
    fn cleared_registry_does_not_reset_the_chain() {
        let registry = RetryRegistry::new();
        let mut guard = registry.track(OperationId::new(SaveTriggerReason::Periodic));
        guard.record_retry(ErrorKind::Network);
        registry.clear();
        assert_eq!(guard.attempts(), 1);
        assert_eq!(guard.record_retry(ErrorKind::Network), 2);
        assert!(registry.is_empty(), "a cleared chain must not reappear");

        // Chains tracked after the clear are listed as usual.
        let mut fresh = registry.track(OperationId::new(SaveTriggerReason::Manual));
        fresh.record_retry(ErrorKind::Timeout);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn backoff_schedule() {
        let backoff = Backoff::new(3);
        let transient = classify_message("network down");
        assert_eq!(backoff.decide(0, &transient), RetryDecision::RetryAfter(Duration::from_secs(1)));
        assert_eq!(backoff.decide(1, &transient), RetryDecision::RetryAfter(Duration::from_secs(2)));
        assert_eq!(backoff.decide(2, &transient), RetryDecision::RetryAfter(Duration::from_secs(4)));
        assert_eq!(backoff.decide(3, &transient), RetryDecision::GiveUp(GiveUpReason::Exhausted));
    }

    #[test]
    fn non_retryable_gives_up_immediately() {
        let backoff = Backoff::new(3);
        let auth = classify_message("401 Unauthorized");
        assert_eq!(backoff.decide(0, &auth), RetryDecision::GiveUp(GiveUpReason::NotRetryable));
    }
}
