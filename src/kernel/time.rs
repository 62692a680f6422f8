use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Base delay of the first retry. Attempt `n` waits `BACKOFF_BASE_MS * 2^n`.
pub const BACKOFF_BASE_MS: u64 = 1_000;

/// Wall-clock milliseconds since the UNIX epoch. Used for save keys and result timestamps.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `1000 * 2^attempt` ms, saturating instead of overflowing for absurd attempt counts.
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor))
}
