pub mod config;
pub mod kernel;
pub mod snapshot;
pub mod storage;

// Re-export the pieces most callers need
pub use config::SchedulerConfig;
pub use kernel::event::{SaveEvent, SaveFailure, SaveOutcome, SaveResult, SaveTriggerReason};
pub use kernel::observer::{SaveCallbacks, SaveObserver};
pub use kernel::scheduler::{AutoSaveScheduler, Dispatch};
