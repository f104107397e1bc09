//! smsguard Telemetry
//!
//! Metrics for batch scoring runs.
//!
//! Provides:
//! - An in-process collector with atomic counters and point-in-time snapshots
//! - Descriptions and emit helpers for the `metrics` facade

pub mod facade;
pub mod metrics;

pub use facade::describe_metrics;
pub use metrics::{MetricsCollector, MetricsSnapshot};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::{MetricsCollector, MetricsSnapshot};
}
