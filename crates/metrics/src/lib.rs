//! Metrics collection and export for the Wingman gateway.
//!
//! Uses the `metrics` crate facade; when the `prometheus` feature is
//! disabled every call below is a no-op, so call sites never need to check
//! whether metrics are enabled.
//!
//! ```rust,ignore
//! use wingman_metrics::{counter, connection};
//!
//! counter!(connection::CONNECTIONS_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
