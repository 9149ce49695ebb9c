//! Normalized position metrics.

use serde::{Serialize, Serializer};
use std::fmt;

use super::Exchange;

/// Rendered value for metrics whose target position was not in the response.
pub const NOT_FOUND: &str = "not_found";

/// Value carried by a metric row.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Exchange-provided string, kept verbatim (decimal strings stay exact).
    Text(String),
    /// Locally computed number.
    Number(f64),
    /// Target symbol absent from the response.
    NotFound,
    /// No value (field missing, or the exchange call failed).
    Null,
}

impl MetricValue {
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetricValue::NotFound)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Number(n) => write!(f, "{}", n),
            MetricValue::NotFound => f.write_str(NOT_FOUND),
            MetricValue::Null => Ok(()),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Text(s) => serializer.serialize_str(s),
            MetricValue::Number(n) => serializer.serialize_f64(*n),
            MetricValue::NotFound => serializer.serialize_str(NOT_FOUND),
            MetricValue::Null => serializer.serialize_none(),
        }
    }
}

impl From<Option<String>> for MetricValue {
    fn from(v: Option<String>) -> Self {
        v.map(MetricValue::Text).unwrap_or(MetricValue::Null)
    }
}

/// One `(exchange, symbol, metric, value)` row. No identity beyond its fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionMetric {
    pub exchange: Exchange,
    /// Target instrument; empty for account-wide metrics.
    pub symbol: String,
    pub metric: String,
    pub value: MetricValue,
}

impl PositionMetric {
    pub fn new(
        exchange: Exchange,
        symbol: impl Into<String>,
        metric: impl Into<String>,
        value: MetricValue,
    ) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            metric: metric.into(),
            value,
        }
    }
}
