use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::storage;
use crate::core::storage::StorageError;

/// The type value of a gauge metric.
pub const METRIC_TYPE_GAUGE: &str = "gauge";
/// The type value of a counter metric.
pub const METRIC_TYPE_COUNTER: &str = "counter";

/// The error returned when a metric type value is neither a gauge nor a counter.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unknown metric type")]
pub struct UnknownMetricType(pub String);

/// The supported metric types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    #[display("{}", METRIC_TYPE_GAUGE)]
    Gauge,
    #[display("{}", METRIC_TYPE_COUNTER)]
    Counter,
}

impl MetricType {
    /// Returns the type value as used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => METRIC_TYPE_GAUGE,
            MetricType::Counter => METRIC_TYPE_COUNTER,
        }
    }
}

impl FromStr for MetricType {
    type Err = UnknownMetricType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            METRIC_TYPE_GAUGE => Ok(MetricType::Gauge),
            METRIC_TYPE_COUNTER => Ok(MetricType::Counter),
            _ => Err(UnknownMetricType(value.to_string())),
        }
    }
}

/// An instantaneous measurement, each upsert replaces the previous value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GaugeMetric {
    pub value: f64,
    pub name: String,
}

impl GaugeMetric {
    pub fn new<S: Into<String>>(name: S, value: f64) -> Self {
        Self {
            value,
            name: name.into(),
        }
    }
}

impl Display for GaugeMetric {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "gauge {}={}", self.name, self.value)
    }
}

/// A monotonically accumulating count.
///
/// The stored value is the accumulated total, the caller is responsible for adding the
/// incoming delta to the previous value before upserting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CounterMetric {
    pub value: i64,
    pub name: String,
}

impl CounterMetric {
    pub fn new<S: Into<String>>(name: S, value: i64) -> Self {
        Self {
            value,
            name: name.into(),
        }
    }
}

impl Display for CounterMetric {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "counter {}={}", self.name, self.value)
    }
}

/// A metric of any of the supported types.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Metric {
    #[display("{}", _0)]
    Gauge(GaugeMetric),
    #[display("{}", _0)]
    Counter(CounterMetric),
}

impl Metric {
    /// Returns the name of the metric.
    pub fn name(&self) -> &str {
        match self {
            Metric::Gauge(e) => e.name.as_str(),
            Metric::Counter(e) => e.name.as_str(),
        }
    }

    /// Returns the type of the metric.
    pub fn metric_type(&self) -> MetricType {
        match self {
            Metric::Gauge(_) => MetricType::Gauge,
            Metric::Counter(_) => MetricType::Counter,
        }
    }

    /// Verify that the metric can be stored.
    ///
    /// It returns [StorageError::InvalidMetric] when the name is empty or the gauge value is not finite.
    pub fn validate(&self) -> storage::Result<()> {
        if self.name().trim().is_empty() {
            return Err(StorageError::InvalidMetric(
                "metric name cannot be empty".to_string(),
            ));
        }

        if let Metric::Gauge(e) = self {
            if !e.value.is_finite() {
                return Err(StorageError::InvalidMetric(format!(
                    "gauge {} has a non-finite value {}",
                    e.name, e.value
                )));
            }
        }

        Ok(())
    }
}

impl From<GaugeMetric> for Metric {
    fn from(value: GaugeMetric) -> Self {
        Metric::Gauge(value)
    }
}

impl From<CounterMetric> for Metric {
    fn from(value: CounterMetric) -> Self {
        Metric::Counter(value)
    }
}
