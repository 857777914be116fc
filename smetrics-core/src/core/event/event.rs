use derive_more::Display;
use itertools::Itertools;

use crate::core::metrics::{CounterMetric, GaugeMetric, Metric};

/// The payload carried by a store [Event].
#[derive(Debug, Clone, PartialEq, Display)]
pub enum EventPayload {
    #[display("{}", _0)]
    Gauge(GaugeMetric),
    #[display("{}", _0)]
    Counter(CounterMetric),
    #[display("[{}]", _0.iter().join(", "))]
    Batch(Vec<Metric>),
}

impl From<Metric> for EventPayload {
    fn from(value: Metric) -> Self {
        match value {
            Metric::Gauge(e) => EventPayload::Gauge(e),
            Metric::Counter(e) => EventPayload::Counter(e),
        }
    }
}

/// The notifications emitted by a store.
///
/// Events are only emitted after the mutation has been committed, they're delivered
/// synchronously on the calling thread and never queued or retried.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum Event {
    /// Invoked after one or more metrics have been upserted.
    #[display("after upsert {}", _0)]
    AfterUpsert(EventPayload),
}

impl Event {
    /// Returns the payload of the event.
    pub fn payload(&self) -> &EventPayload {
        match self {
            Event::AfterUpsert(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        let event = Event::AfterUpsert(EventPayload::Batch(vec![
            Metric::Gauge(GaugeMetric::new("temp", 37.1)),
            Metric::Counter(CounterMetric::new("requests", 8)),
        ]));

        assert_eq!(
            "after upsert [gauge temp=37.1, counter requests=8]",
            event.to_string()
        );
    }

    #[test]
    fn test_payload_from_metric() {
        let metric = Metric::Counter(CounterMetric::new("requests", 5));

        let result = EventPayload::from(metric);

        assert_eq!(
            EventPayload::Counter(CounterMetric::new("requests", 5)),
            result
        );
    }
}
