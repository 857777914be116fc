use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::metrics::{CounterMetric, GaugeMetric, Metric, MetricType};
use crate::core::service;
use crate::core::service::ServiceError;

/// The wire representation of a single metric, optionally signed with a hash.
///
/// The type is kept as the raw value so an unsupported type can be reported as such,
/// instead of being rejected as malformed JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub metric_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl MetricEnvelope {
    pub fn gauge<S: Into<String>>(id: S, value: f64) -> Self {
        Self {
            id: id.into(),
            metric_type: MetricType::Gauge.to_string(),
            delta: None,
            value: Some(value),
            hash: None,
        }
    }

    pub fn counter<S: Into<String>>(id: S, delta: i64) -> Self {
        Self {
            id: id.into(),
            metric_type: MetricType::Counter.to_string(),
            delta: Some(delta),
            value: None,
            hash: None,
        }
    }

    /// Create an envelope which requests the stored value of a metric.
    pub fn query<S: Into<String>, T: Into<String>>(metric_type: T, id: S) -> Self {
        Self {
            id: id.into(),
            metric_type: metric_type.into(),
            delta: None,
            value: None,
            hash: None,
        }
    }

    /// Parse an envelope from the plain-text representation of a metric.
    ///
    /// The type is verified before the value, an unknown type is always reported as such.
    pub fn parse(metric_type: &str, id: &str, raw_value: &str) -> service::Result<Self> {
        let envelope = match MetricType::from_str(metric_type)? {
            MetricType::Gauge => {
                let value = f64::from_str(raw_value.trim()).map_err(|e| {
                    ServiceError::Validation(format!("invalid gauge value {}, {}", raw_value, e))
                })?;
                Self::gauge(id, value)
            }
            MetricType::Counter => {
                let delta = i64::from_str(raw_value.trim()).map_err(|e| {
                    ServiceError::Validation(format!("invalid counter value {}, {}", raw_value, e))
                })?;
                Self::counter(id, delta)
            }
        };

        envelope.validate()?;
        Ok(envelope)
    }

    /// Set the hash of the envelope.
    pub fn with_hash<S: Into<String>>(mut self, hash: S) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Returns the metric type of the envelope.
    pub fn kind(&self) -> service::Result<MetricType> {
        Ok(MetricType::from_str(self.metric_type.as_str())?)
    }

    /// Verify that the envelope describes a storable metric.
    ///
    /// The id must be present and only the field matching the type (`value` for gauges,
    /// `delta` for counters) must be set.
    pub fn validate(&self) -> service::Result<MetricType> {
        let kind = self.kind()?;
        if self.id.trim().is_empty() {
            return Err(ServiceError::Validation("metric id is required".to_string()));
        }

        match (kind, self.value, self.delta) {
            (MetricType::Gauge, Some(value), None) => {
                if !value.is_finite() {
                    return Err(ServiceError::Validation(format!(
                        "gauge {} has a non-finite value",
                        self.id
                    )));
                }
                Ok(kind)
            }
            (MetricType::Counter, None, Some(_)) => Ok(kind),
            (MetricType::Gauge, _, _) => Err(ServiceError::Validation(format!(
                "gauge {} requires a value and no delta",
                self.id
            ))),
            (MetricType::Counter, _, _) => Err(ServiceError::Validation(format!(
                "counter {} requires a delta and no value",
                self.id
            ))),
        }
    }

    /// Returns the string over which the hash of the envelope is calculated.
    pub fn canonical(&self) -> service::Result<String> {
        match self.validate()? {
            MetricType::Gauge => Ok(format!(
                "{}:{}:{:.6}",
                self.id,
                MetricType::Gauge,
                self.value.unwrap_or_default()
            )),
            MetricType::Counter => Ok(format!(
                "{}:{}:{}",
                self.id,
                MetricType::Counter,
                self.delta.unwrap_or_default()
            )),
        }
    }

    /// Convert the envelope into a metric.
    /// The value of a counter metric is the delta of the envelope.
    pub fn into_metric(self) -> service::Result<Metric> {
        match self.validate()? {
            MetricType::Gauge => Ok(Metric::Gauge(GaugeMetric::new(
                self.id,
                self.value.unwrap_or_default(),
            ))),
            MetricType::Counter => Ok(Metric::Counter(CounterMetric::new(
                self.id,
                self.delta.unwrap_or_default(),
            ))),
        }
    }
}

impl From<Metric> for MetricEnvelope {
    fn from(value: Metric) -> Self {
        match value {
            Metric::Gauge(e) => Self::gauge(e.name, e.value),
            Metric::Counter(e) => Self::counter(e.name, e.value),
        }
    }
}
