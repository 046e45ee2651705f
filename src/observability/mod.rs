//! Observability primitives.
//!
//! Log and metric *emission* sites live throughout this crate via the
//! `tracing` and `metrics` facades directly; `Logger` and `Metrics` here are
//! handle types for callers that want to pass observability context through
//! an `Engine`, not a subscriber/exporter setup layer. Wiring a subscriber or
//! a Prometheus exporter is the embedding application's job.

mod logging;
mod metrics;

pub use logging::Logger;
pub use metrics::Metrics;
