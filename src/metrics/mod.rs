//! Metric recording, snapshots and threshold evaluation.
mod histogram;
mod recorder;
mod snapshot;
mod threshold;


pub use histogram::LatencyHistogram;
pub use recorder::MetricsRecorder;
pub use snapshot::{
    MetricKind, MetricSummary, MetricValues, MetricsSnapshot, SnapshotState, ThresholdBreach,
    ThresholdStatus, ValueKind, is_custom_metric,
};
pub use threshold::{Aggregation, Comparison, Threshold};

/// Built-in metric names shared by the transport, orchestrator and driver.
pub mod names {
    pub const HTTP_REQS: &str = "http_reqs";
    pub const HTTP_REQ_DURATION: &str = "http_req_duration";
    pub const HTTP_REQ_FAILED: &str = "http_req_failed";
    pub const VUS: &str = "vus";
    pub const VUS_MAX: &str = "vus_max";
    pub const ITERATIONS: &str = "iterations";
    pub const ITERATION_DURATION: &str = "iteration_duration";
    pub const DROPPED_ITERATIONS: &str = "dropped_iterations";
}
