use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;
use smetrics_core::core::metrics::{CounterMetric, GaugeMetric, Metric};

/// The name of the counter which is increased on every poll.
pub const POLL_COUNT: &str = "PollCount";
/// The name of the gauge which carries a random value.
pub const RANDOM_VALUE: &str = "RandomValue";

/// A source of metrics which is sampled by the agent.
#[cfg_attr(test, automock)]
pub trait MetricSource: Debug + Send + Sync {
    /// Sample the current metrics of the source.
    ///
    /// Counter metrics carry the delta since the previous poll.
    fn poll(&self) -> Vec<Metric>;
}

/// The metric source which emits the agent's own metrics.
#[derive(Debug, Default)]
pub struct CustomMetricSource;

impl MetricSource for CustomMetricSource {
    fn poll(&self) -> Vec<Metric> {
        vec![
            CounterMetric::new(POLL_COUNT, 1).into(),
            GaugeMetric::new(RANDOM_VALUE, rand::random::<f64>()).into(),
        ]
    }
}
