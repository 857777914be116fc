use std::fmt::Debug;

use async_trait::async_trait;
#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::core::event::Observer;
use crate::core::metrics::{CounterMetric, GaugeMetric, Metric};
use crate::core::storage;

/// The authoritative table of the current gauge and counter values.
///
/// Gauges and counters live in independent namespaces, the same name can exist as both
/// a gauge and a counter with unrelated values.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait Repository: Debug + Send + Sync {
    /// Store the given gauge, replacing any previous value of the same name.
    async fn upsert_gauge(&self, metric: GaugeMetric) -> storage::Result<()>;

    /// Store the given counter value as is.
    ///
    /// The value is the new total, adding the delta to the previous value is the responsibility of the caller.
    async fn upsert_counter(&self, metric: CounterMetric) -> storage::Result<()>;

    /// Store all given metrics at once.
    ///
    /// Every metric is validated before anything is stored, an invalid metric fails the whole batch.
    async fn upsert_many(&self, metrics: Vec<Metric>) -> storage::Result<()>;

    /// Retrieve the value of the gauge with the given name.
    ///
    /// It returns [storage::StorageError::MetricNotFound] when the gauge doesn't exist.
    async fn get_gauge(&self, name: &str) -> storage::Result<f64>;

    /// Retrieve the value of the counter with the given name.
    ///
    /// It returns [storage::StorageError::MetricNotFound] when the counter doesn't exist.
    async fn get_counter(&self, name: &str) -> storage::Result<i64>;

    /// Retrieve all stored gauges, in no particular order.
    async fn get_all_gauges(&self) -> storage::Result<Vec<GaugeMetric>>;

    /// Retrieve all stored counters, in no particular order.
    async fn get_all_counters(&self) -> storage::Result<Vec<CounterMetric>>;

    /// Register an observer which is invoked after each successful upsert.
    /// This should only be done while setting up the store.
    fn add_observer(&self, observer: Box<dyn Observer>);

    /// Verify that the backing store is reachable.
    async fn healthcheck(&self) -> storage::Result<()> {
        Ok(())
    }
}
