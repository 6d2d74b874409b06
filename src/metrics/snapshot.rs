use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

impl MetricKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Rate => "rate",
            MetricKind::Trend => "trend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Time,
    Default,
}

/// Aggregates of one metric. Only the fields meaningful for its kind are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub med: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(rename = "p(90)", default, skip_serializing_if = "Option::is_none")]
    pub p90: Option<f64>,
    #[serde(rename = "p(95)", default, skip_serializing_if = "Option::is_none")]
    pub p95: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fails: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdStatus {
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub contains: ValueKind,
    pub values: MetricValues,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub thresholds: BTreeMap<String, ThresholdStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotState {
    #[serde(rename = "testRunDurationMs")]
    pub test_run_duration_ms: f64,
}

/// Point-in-time aggregate of every metric recorded during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub state: SnapshotState,
    pub metrics: BTreeMap<String, MetricSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThresholdBreach {
    pub metric: String,
    pub expression: String,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricValues> {
        self.metrics.get(name).map(|summary| &summary.values)
    }

    /// Every threshold evaluated as failed, ordered by metric name.
    #[must_use]
    pub fn breached_thresholds(&self) -> Vec<ThresholdBreach> {
        self.metrics
            .iter()
            .flat_map(|(name, summary)| {
                summary
                    .thresholds
                    .iter()
                    .filter(|(_, status)| !status.ok)
                    .map(move |(expression, _)| ThresholdBreach {
                        metric: name.clone(),
                        expression: expression.clone(),
                    })
            })
            .collect()
    }

    /// Names of the per-test custom metrics, in name order.
    #[must_use]
    pub fn custom_metric_names(&self) -> Vec<&str> {
        self.metrics
            .keys()
            .map(String::as_str)
            .filter(|name| is_custom_metric(name))
            .collect()
    }
}

/// Per-test metrics are the ones named `*_errors`, `*_response_time` or
/// `*_requests`.
#[must_use]
pub fn is_custom_metric(name: &str) -> bool {
    name.contains("_errors") || name.contains("_response_time") || name.contains("_requests")
}
