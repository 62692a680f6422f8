//! Save telemetry.
//!
//! Telemetry is a write-only side channel. The executor records into it but
//! never reads it back when deciding whether to skip, reduce or retry.
//!
//! Events carry ids, reasons, sizes and durations only, never snapshot content.

pub mod event;
pub mod metrics;
pub mod recorder;
