pub mod classify;
pub mod debounce;
pub mod error;
pub mod event;
pub mod executor;
pub mod observer;
pub mod retry;
pub mod scheduler;
pub mod telemetry;
pub mod time;
