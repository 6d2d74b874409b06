use std::fmt::Write as _;

use crate::error::{AppError, AppResult, ReportError};
use crate::metrics::MetricValues;

pub(super) fn write_line(output: &mut String, line: &str) -> AppResult<()> {
    writeln!(output, "{}", line)
        .map_err(|err| AppError::report(ReportError::WriteLine { source: err }))
}

pub(super) fn fixed2(value: f64) -> String {
    format!("{:.2}", value)
}

pub(super) fn percent(rate: f64) -> String {
    fixed2(rate * 100.0)
}

/// How a per-test metric is shown in the summary and HTML report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CustomDisplay {
    Percent(f64),
    Millis(f64),
    Count(f64),
}

impl CustomDisplay {
    /// Picks the field matching the metric's suffix (`_errors` rate,
    /// `_response_time` avg, `_requests` count), falling back to the first
    /// present of rate, avg and count.
    #[must_use]
    pub fn for_metric(name: &str, values: &MetricValues) -> Option<Self> {
        let by_suffix = if name.ends_with("_errors") {
            values.rate.map(CustomDisplay::Percent)
        } else if name.ends_with("_response_time") {
            values.avg.map(CustomDisplay::Millis)
        } else if name.ends_with("_requests") {
            values.count.map(CustomDisplay::Count)
        } else {
            None
        };
        by_suffix
            .or_else(|| values.rate.map(CustomDisplay::Percent))
            .or_else(|| values.avg.map(CustomDisplay::Millis))
            .or_else(|| values.count.map(CustomDisplay::Count))
    }

    #[must_use]
    pub fn render(self) -> String {
        match self {
            CustomDisplay::Percent(rate) => format!("{}%", percent(rate)),
            CustomDisplay::Millis(avg) => format!("{}ms", fixed2(avg)),
            CustomDisplay::Count(count) => format!("{}", count),
        }
    }
}

/// Quotes a CSV field when it contains a separator, quote or line break.
pub(super) fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
