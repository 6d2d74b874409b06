use std::fmt;

use crate::error::ConfigError;

/// Tolerance used by `==` thresholds.
const EQUALITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Med,
    Max,
    /// Percentile in the 0..=100 range, e.g. `p(95)`.
    Percentile(f64),
    Rate,
    Count,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
}

impl Comparison {
    #[must_use]
    pub fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Less => observed < bound,
            Comparison::LessOrEqual => observed <= bound,
            Comparison::Greater => observed > bound,
            Comparison::GreaterOrEqual => observed >= bound,
            Comparison::Equal => (observed - bound).abs() < EQUALITY_EPSILON,
        }
    }
}

/// One pass/fail criterion such as `p(95)<3000` on `http_req_duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

impl Threshold {
    /// Parses `<aggregation><operator><number>`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidThreshold` when any of the three parts is malformed.
    pub fn parse(metric: &str, expression: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidThreshold {
            metric: metric.to_owned(),
            expression: expression.to_owned(),
        };

        let compact: String = expression.chars().filter(|ch| !ch.is_whitespace()).collect();
        let op_start = compact
            .find(['<', '>', '='])
            .ok_or_else(invalid)?;
        let (aggregation_part, rest) = compact.split_at(op_start);
        let (comparison, bound_part) = if let Some(bound) = rest.strip_prefix("<=") {
            (Comparison::LessOrEqual, bound)
        } else if let Some(bound) = rest.strip_prefix(">=") {
            (Comparison::GreaterOrEqual, bound)
        } else if let Some(bound) = rest.strip_prefix("===") {
            (Comparison::Equal, bound)
        } else if let Some(bound) = rest.strip_prefix("==") {
            (Comparison::Equal, bound)
        } else if let Some(bound) = rest.strip_prefix('<') {
            (Comparison::Less, bound)
        } else if let Some(bound) = rest.strip_prefix('>') {
            (Comparison::Greater, bound)
        } else {
            return Err(invalid());
        };

        let bound: f64 = bound_part.parse().ok().ok_or_else(invalid)?;
        if !bound.is_finite() {
            return Err(invalid());
        }
        let aggregation = parse_aggregation(aggregation_part).ok_or_else(invalid)?;

        Ok(Self {
            metric: metric.to_owned(),
            expression: expression.to_owned(),
            aggregation,
            comparison,
            bound,
        })
    }

    #[must_use]
    pub fn passes(&self, observed: f64) -> bool {
        self.comparison.holds(observed, self.bound)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.expression)
    }
}

fn parse_aggregation(value: &str) -> Option<Aggregation> {
    match value {
        "avg" => Some(Aggregation::Avg),
        "min" => Some(Aggregation::Min),
        "med" => Some(Aggregation::Med),
        "max" => Some(Aggregation::Max),
        "rate" => Some(Aggregation::Rate),
        "count" => Some(Aggregation::Count),
        "value" => Some(Aggregation::Value),
        other => {
            let inner = other.strip_prefix("p(")?.strip_suffix(')')?;
            let percentile: f64 = inner.parse().ok()?;
            (percentile > 0.0 && percentile <= 100.0).then_some(Aggregation::Percentile(percentile))
        }
    }
}
