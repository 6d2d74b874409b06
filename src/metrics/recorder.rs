use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::MetricsError;

use super::histogram::LatencyHistogram;
use super::snapshot::{
    MetricKind, MetricSummary, MetricValues, MetricsSnapshot, SnapshotState, ThresholdStatus,
    ValueKind,
};
use super::threshold::{Aggregation, Threshold};

#[derive(Debug)]
struct TrendSeries {
    hist: LatencyHistogram,
    sum: f64,
    min: f64,
    max: f64,
    count: u64,
}

impl TrendSeries {
    fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            hist: LatencyHistogram::new()?,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        })
    }

    fn add(&mut self, value: f64) -> Result<(), MetricsError> {
        self.hist.record_ms(value)?;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count = self.count.saturating_add(1);
        Ok(())
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn bounds(&self) -> (f64, f64) {
        if self.count == 0 {
            (0.0, 0.0)
        } else {
            (self.min, self.max)
        }
    }
}

#[derive(Debug)]
enum Series {
    Counter { sum: f64 },
    Gauge { value: f64, min: f64, max: f64 },
    Rate { passes: u64, fails: u64 },
    Trend(Box<TrendSeries>),
}

impl Series {
    const fn kind(&self) -> MetricKind {
        match self {
            Series::Counter { .. } => MetricKind::Counter,
            Series::Gauge { .. } => MetricKind::Gauge,
            Series::Rate { .. } => MetricKind::Rate,
            Series::Trend(_) => MetricKind::Trend,
        }
    }

    fn summarize(&self, run_duration: Duration) -> MetricSummary {
        let (values, contains) = match self {
            Series::Counter { sum } => {
                let seconds = run_duration.as_secs_f64();
                let rate = if seconds > 0.0 { sum / seconds } else { 0.0 };
                (
                    MetricValues {
                        count: Some(*sum),
                        rate: Some(rate),
                        ..MetricValues::default()
                    },
                    ValueKind::Default,
                )
            }
            Series::Gauge { value, min, max } => (
                MetricValues {
                    value: Some(*value),
                    min: Some(*min),
                    max: Some(*max),
                    ..MetricValues::default()
                },
                ValueKind::Default,
            ),
            Series::Rate { passes, fails } => (
                MetricValues {
                    rate: Some(rate_of(*passes, *fails)),
                    passes: Some(*passes),
                    fails: Some(*fails),
                    ..MetricValues::default()
                },
                ValueKind::Default,
            ),
            Series::Trend(trend) => {
                let (min, max) = trend.bounds();
                (
                    MetricValues {
                        avg: Some(trend.avg()),
                        min: Some(min),
                        med: Some(trend.hist.quantile_ms(0.5)),
                        max: Some(max),
                        p90: Some(trend.hist.quantile_ms(0.9)),
                        p95: Some(trend.hist.quantile_ms(0.95)),
                        ..MetricValues::default()
                    },
                    ValueKind::Time,
                )
            }
        };
        MetricSummary {
            kind: self.kind(),
            contains,
            values,
            thresholds: BTreeMap::new(),
        }
    }

    /// The value a threshold compares against, `None` when the aggregation
    /// does not apply to this kind.
    fn observe(&self, aggregation: Aggregation, run_duration: Duration) -> Option<f64> {
        match (self, aggregation) {
            (Series::Trend(trend), Aggregation::Avg) => Some(trend.avg()),
            (Series::Trend(trend), Aggregation::Min) => Some(trend.bounds().0),
            (Series::Trend(trend), Aggregation::Max) => Some(trend.bounds().1),
            (Series::Trend(trend), Aggregation::Med) => Some(trend.hist.quantile_ms(0.5)),
            (Series::Trend(trend), Aggregation::Percentile(percentile)) => {
                Some(trend.hist.quantile_ms(percentile / 100.0))
            }
            (Series::Trend(trend), Aggregation::Count) => Some(trend.count as f64),
            (Series::Rate { passes, fails }, Aggregation::Rate) => Some(rate_of(*passes, *fails)),
            (Series::Counter { sum }, Aggregation::Count) => Some(*sum),
            (Series::Counter { sum }, Aggregation::Rate) => {
                let seconds = run_duration.as_secs_f64();
                Some(if seconds > 0.0 { sum / seconds } else { 0.0 })
            }
            (Series::Gauge { value, .. }, Aggregation::Value) => Some(*value),
            (Series::Gauge { min, .. }, Aggregation::Min) => Some(*min),
            (Series::Gauge { max, .. }, Aggregation::Max) => Some(*max),
            (
                Series::Trend(_),
                Aggregation::Rate | Aggregation::Value,
            )
            | (
                Series::Rate { .. },
                Aggregation::Avg
                | Aggregation::Min
                | Aggregation::Med
                | Aggregation::Max
                | Aggregation::Percentile(_)
                | Aggregation::Count
                | Aggregation::Value,
            )
            | (
                Series::Counter { .. },
                Aggregation::Avg
                | Aggregation::Min
                | Aggregation::Med
                | Aggregation::Max
                | Aggregation::Percentile(_)
                | Aggregation::Value,
            )
            | (
                Series::Gauge { .. },
                Aggregation::Avg
                | Aggregation::Med
                | Aggregation::Percentile(_)
                | Aggregation::Rate
                | Aggregation::Count,
            ) => None,
        }
    }
}

fn rate_of(passes: u64, fails: u64) -> f64 {
    let total = passes.saturating_add(fails);
    if total == 0 {
        0.0
    } else {
        passes as f64 / total as f64
    }
}

/// Thread-safe store for counters, gauges, rates and trends.
///
/// Recording never fails from the caller's point of view: a metric name
/// reused with a different kind, or a histogram error, is logged and the
/// sample dropped.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    series: Mutex<BTreeMap<String, Series>>,
}

impl MetricsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Series>> {
        self.series.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_counter(&self, name: &str, value: f64) {
        let result = self.update(name, MetricKind::Counter, |series| {
            if let Series::Counter { sum } = series {
                *sum += value;
            }
            Ok(())
        });
        log_failure(name, result);
    }

    pub fn set_gauge(&self, name: &str, value: f64) {
        let result = self.update(name, MetricKind::Gauge, |series| {
            if let Series::Gauge {
                value: current,
                min,
                max,
            } = series
            {
                *current = value;
                *min = min.min(value);
                *max = max.max(value);
            }
            Ok(())
        });
        log_failure(name, result);
    }

    /// Adds one sample to a rate; `hit` counts towards the rate value.
    pub fn add_rate(&self, name: &str, hit: bool) {
        let result = self.update(name, MetricKind::Rate, |series| {
            if let Series::Rate { passes, fails } = series {
                if hit {
                    *passes = passes.saturating_add(1);
                } else {
                    *fails = fails.saturating_add(1);
                }
            }
            Ok(())
        });
        log_failure(name, result);
    }

    /// Adds one millisecond sample to a trend.
    pub fn add_trend(&self, name: &str, value_ms: f64) {
        let result = self.update(name, MetricKind::Trend, |series| match series {
            Series::Trend(trend) => trend.add(value_ms),
            Series::Counter { .. } | Series::Gauge { .. } | Series::Rate { .. } => Ok(()),
        });
        log_failure(name, result);
    }

    fn update<F>(&self, name: &str, kind: MetricKind, apply: F) -> Result<(), MetricsError>
    where
        F: FnOnce(&mut Series) -> Result<(), MetricsError>,
    {
        let mut series = self.lock();
        if let Some(existing) = series.get_mut(name) {
            if existing.kind() != kind {
                return Err(MetricsError::KindMismatch {
                    name: name.to_owned(),
                    existing: existing.kind().as_str(),
                });
            }
            return apply(existing);
        }

        let mut created = match kind {
            MetricKind::Counter => Series::Counter { sum: 0.0 },
            MetricKind::Gauge => Series::Gauge {
                value: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            MetricKind::Rate => Series::Rate {
                passes: 0,
                fails: 0,
            },
            MetricKind::Trend => Series::Trend(Box::new(TrendSeries::new()?)),
        };
        apply(&mut created)?;
        series.insert(name.to_owned(), created);
        Ok(())
    }

    /// Summarizes every metric and evaluates `thresholds` against the
    /// recorded samples. Thresholds on metrics that never received a sample
    /// are skipped.
    #[must_use]
    pub fn snapshot(&self, run_duration: Duration, thresholds: &[Threshold]) -> MetricsSnapshot {
        let series = self.lock();
        let mut metrics: BTreeMap<String, MetricSummary> = series
            .iter()
            .map(|(name, entry)| (name.clone(), entry.summarize(run_duration)))
            .collect();

        for threshold in thresholds {
            let (Some(entry), Some(summary)) = (
                series.get(&threshold.metric),
                metrics.get_mut(&threshold.metric),
            ) else {
                debug!("No samples for threshold {}; skipping.", threshold);
                continue;
            };
            let ok = match entry.observe(threshold.aggregation, run_duration) {
                Some(observed) => threshold.passes(observed),
                None => {
                    warn!(
                        "Threshold {} does not apply to {} metric; marking as failed.",
                        threshold,
                        entry.kind().as_str()
                    );
                    false
                }
            };
            summary
                .thresholds
                .insert(threshold.expression.clone(), ThresholdStatus { ok });
        }

        MetricsSnapshot {
            state: SnapshotState {
                test_run_duration_ms: run_duration.as_secs_f64() * 1000.0,
            },
            metrics,
        }
    }
}

fn log_failure(name: &str, result: Result<(), MetricsError>) {
    if let Err(err) = result {
        warn!("Dropping sample for metric '{}': {}", name, err);
    }
}
