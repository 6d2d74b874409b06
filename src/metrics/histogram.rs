use hdrhistogram::Histogram;

use crate::error::MetricsError;

/// Trend samples are stored with microsecond resolution.
const MICROS_PER_MILLI: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new latency histogram.
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let hist = Histogram::<u64>::new(3).map_err(|err| MetricsError::Histogram {
            context: "create",
            source: Box::new(err),
        })?;
        Ok(Self { hist })
    }

    /// Record a value in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be recorded.
    pub fn record_ms(&mut self, value_ms: f64) -> Result<(), MetricsError> {
        let micros = to_micros(value_ms).max(1);
        self.hist
            .record(micros)
            .map_err(|err| MetricsError::Histogram {
                context: "record",
                source: Box::new(err),
            })
    }

    /// Value at `quantile` (0.0..=1.0) in milliseconds; 0 when empty.
    #[must_use]
    pub fn quantile_ms(&self, quantile: f64) -> f64 {
        if self.count() == 0 {
            return 0.0;
        }
        from_micros(self.hist.value_at_quantile(quantile))
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.hist.len()
    }
}

fn to_micros(value_ms: f64) -> u64 {
    if value_ms.is_finite() && value_ms > 0.0 {
        (value_ms * MICROS_PER_MILLI).round() as u64
    } else {
        0
    }
}

fn from_micros(value: u64) -> f64 {
    value as f64 / MICROS_PER_MILLI
}
