//! Request telemetry.
//!
//! Lock-free counters recorded by the pipeline stages, plus a point-in-time
//! snapshot for display.
//!
//! ```text
//! Pipeline Stages ─────► RequestMetrics ─────► TelemetrySnapshot ─────► CLI / logs
//!                        (atomic counters)     (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use skyfetch::telemetry::RequestMetrics;
//!
//! let metrics = RequestMetrics::new();
//! metrics.cache_hit();
//! metrics.network_call();
//!
//! let snapshot = metrics.snapshot();
//! println!("{}", snapshot);
//! ```

mod metrics;
mod snapshot;

pub use metrics::RequestMetrics;
pub use snapshot::TelemetrySnapshot;
