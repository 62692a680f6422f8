use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Scheduler settings. Fixed for the lifetime of a scheduler instance.
///
/// Every field is optional in a TOML file; missing ones take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Periodic save cadence.
    pub interval_ms: u64,
    /// Quiet period before a non-manual trigger fires. 0 saves immediately.
    pub debounce_ms: u64,
    pub compression_enabled: bool,
    pub size_threshold_bytes: usize,
    /// Retries after the first write, so at most `max_retries + 1` writes.
    pub max_retries: u32,
    /// Saves kept per session after a successful write. 0 keeps everything.
    pub retain_per_session: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5 * 60 * 1000,
            debounce_ms: 500,
            compression_enabled: false,
            size_threshold_bytes: 100_000,
            max_retries: 3,
            retain_per_session: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("interval_ms must be greater than zero".into()));
        }
        if self.compression_enabled && self.size_threshold_bytes == 0 {
            return Err(ConfigError::Invalid(
                "size_threshold_bytes must be greater than zero when compression is enabled".into(),
            ));
        }
        // Past 2^63 ms the backoff saturates; anything near that is a typo.
        if self.max_retries > 32 {
            return Err(ConfigError::Invalid(format!(
                "max_retries of {} is unreasonably large",
                self.max_retries
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
