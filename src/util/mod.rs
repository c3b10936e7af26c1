//! Shared utilities: wall-clock helpers and telemetry bring-up.

pub mod clock;
pub mod telemetry;

pub use clock::{now_ms, now_secs};
pub use telemetry::init_tracing;
