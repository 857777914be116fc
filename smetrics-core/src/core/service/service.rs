use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::sync::Mutex;

use crate::core::metrics::{CounterMetric, GaugeMetric, Metric, MetricType};
use crate::core::service;
use crate::core::service::{MetricEnvelope, ServiceError};
use crate::core::signing::Signer;
use crate::core::storage::{Repository, StorageError};

/// Applies incoming metric envelopes to a [Repository] and answers metric reads.
///
/// When a signer is configured, envelopes written through [MetricService::update] and
/// [MetricService::update_many] must carry a valid hash and every response envelope is signed.
/// Reads never require a hash.
#[derive(Debug)]
pub struct MetricService {
    repository: Arc<dyn Repository>,
    signer: Option<Box<dyn Signer>>,
    counter_lock: Mutex<()>,
}

impl MetricService {
    pub fn new(repository: Arc<dyn Repository>, signer: Option<Box<dyn Signer>>) -> Self {
        Self {
            repository,
            signer,
            counter_lock: Default::default(),
        }
    }

    /// Returns `true` when envelopes are signed and verified.
    pub fn is_signing(&self) -> bool {
        self.signer.is_some()
    }

    /// Apply the given envelope to the store.
    ///
    /// Gauges overwrite the stored value, counters add their delta to the stored total.
    /// It returns the stored metric as a (signed) envelope.
    pub async fn update(&self, envelope: MetricEnvelope) -> service::Result<MetricEnvelope> {
        self.verify(&envelope)?;
        self.apply(envelope).await
    }

    /// Apply the given envelope to the store without verifying its hash.
    ///
    /// The envelope is still validated. This is used by the plain-text api which has no way
    /// of carrying a hash.
    pub async fn update_unverified(
        &self,
        envelope: MetricEnvelope,
    ) -> service::Result<MetricEnvelope> {
        self.apply(envelope).await
    }

    async fn apply(&self, envelope: MetricEnvelope) -> service::Result<MetricEnvelope> {
        let stored = match envelope.into_metric()? {
            Metric::Gauge(metric) => {
                self.repository.upsert_gauge(metric.clone()).await?;
                MetricEnvelope::gauge(metric.name, metric.value)
            }
            Metric::Counter(metric) => {
                let _guard = self.counter_lock.lock().await;
                let total = self.add_to_counter(&metric.name, metric.value).await?;
                self.repository
                    .upsert_counter(CounterMetric::new(metric.name.clone(), total))
                    .await?;
                MetricEnvelope::counter(metric.name, total)
            }
        };

        debug!("Metric {} has been updated", stored.id);
        self.sign(stored)
    }

    /// Apply all given envelopes to the store at once.
    ///
    /// Every envelope is verified before anything is stored. Duplicate gauges within the
    /// batch keep the last value, duplicate counters have their deltas summed.
    pub async fn update_many(&self, envelopes: Vec<MetricEnvelope>) -> service::Result<()> {
        for envelope in envelopes.iter() {
            self.verify(envelope)?;
        }

        let mut gauges: Vec<GaugeMetric> = vec![];
        let mut gauge_index: HashMap<String, usize> = HashMap::new();
        let mut counters: Vec<CounterMetric> = vec![];
        let mut counter_index: HashMap<String, usize> = HashMap::new();
        for envelope in envelopes {
            match envelope.into_metric()? {
                Metric::Gauge(metric) => match gauge_index.get(&metric.name) {
                    Some(&index) => gauges[index] = metric,
                    None => {
                        gauge_index.insert(metric.name.clone(), gauges.len());
                        gauges.push(metric);
                    }
                },
                Metric::Counter(metric) => match counter_index.get(&metric.name) {
                    Some(&index) => {
                        counters[index].value = checked_add(
                            &metric.name,
                            counters[index].value,
                            metric.value,
                        )?
                    }
                    None => {
                        counter_index.insert(metric.name.clone(), counters.len());
                        counters.push(metric);
                    }
                },
            }
        }

        if gauges.is_empty() && counters.is_empty() {
            debug!("Received an empty metric batch, nothing to update");
            return Ok(());
        }

        let _guard = self.counter_lock.lock().await;
        let mut metrics: Vec<Metric> = gauges.into_iter().map(Metric::Gauge).collect();
        for mut counter in counters {
            counter.value = self.add_to_counter(&counter.name, counter.value).await?;
            metrics.push(Metric::Counter(counter));
        }

        trace!("Updating batch of {} metrics", metrics.len());
        self.repository.upsert_many(metrics).await?;
        Ok(())
    }

    /// Retrieve the stored value of the metric described by the given envelope.
    ///
    /// The hash of the request envelope isn't verified, the response is signed when a signer is configured.
    pub async fn value(&self, envelope: MetricEnvelope) -> service::Result<MetricEnvelope> {
        let kind = envelope.kind()?;
        if envelope.id.trim().is_empty() {
            return Err(ServiceError::Validation("metric id is required".to_string()));
        }

        let stored = match kind {
            MetricType::Gauge => MetricEnvelope::gauge(
                envelope.id.as_str(),
                self.repository.get_gauge(envelope.id.as_str()).await?,
            ),
            MetricType::Counter => MetricEnvelope::counter(
                envelope.id.as_str(),
                self.repository.get_counter(envelope.id.as_str()).await?,
            ),
        };

        self.sign(stored)
    }

    /// Retrieve all stored gauges, ordered by name.
    pub async fn gauges(&self) -> service::Result<Vec<GaugeMetric>> {
        let mut gauges = self.repository.get_all_gauges().await?;
        gauges.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(gauges)
    }

    /// Retrieve all stored counters, ordered by name.
    pub async fn counters(&self) -> service::Result<Vec<CounterMetric>> {
        let mut counters = self.repository.get_all_counters().await?;
        counters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counters)
    }

    /// Verify that the underlying store is reachable.
    pub async fn healthcheck(&self) -> service::Result<()> {
        Ok(self.repository.healthcheck().await?)
    }

    /// Sign the given envelope when a signer is configured.
    pub fn sign(&self, envelope: MetricEnvelope) -> service::Result<MetricEnvelope> {
        match self.signer.as_ref() {
            Some(signer) => {
                let hash = signer.generate(envelope.canonical()?.as_str())?;
                Ok(envelope.with_hash(hash))
            }
            None => Ok(envelope),
        }
    }

    /// Verify the hash of the given envelope when a signer is configured.
    ///
    /// The envelope itself is always validated, a missing or mismatching hash is rejected
    /// with [ServiceError::InvalidHash].
    pub fn verify(&self, envelope: &MetricEnvelope) -> service::Result<()> {
        let canonical = envelope.canonical()?;
        if let Some(signer) = self.signer.as_ref() {
            let expected = signer.generate(canonical.as_str())?;
            let valid = envelope
                .hash
                .as_ref()
                .map(|hash| signer.equal(expected.as_str(), hash.as_str()))
                .unwrap_or(false);

            if !valid {
                warn!("Rejecting metric {}, hash is missing or incorrect", envelope.id);
                return Err(ServiceError::InvalidHash);
            }
        }

        Ok(())
    }

    async fn add_to_counter(&self, name: &str, delta: i64) -> service::Result<i64> {
        let previous = match self.repository.get_counter(name).await {
            Ok(e) => e,
            Err(StorageError::MetricNotFound(_)) => 0,
            Err(e) => return Err(e.into()),
        };

        checked_add(name, previous, delta)
    }
}

fn checked_add(name: &str, value: i64, delta: i64) -> service::Result<i64> {
    value
        .checked_add(delta)
        .ok_or_else(|| ServiceError::Validation(format!("counter {} overflows", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::service::ErrorKind;
    use crate::core::signing::{HmacSigner, MockSigner, SigningError};
    use crate::core::storage::{MemoryStore, MockRepository};
    use crate::init_logger;
    use crate::testing::{counter, gauge};

    fn new_service(signer: Option<Box<dyn Signer>>) -> (Arc<MemoryStore>, MetricService) {
        let store = Arc::new(MemoryStore::new());
        let service = MetricService::new(store.clone(), signer);
        (store, service)
    }

    fn hmac(key: &str) -> Option<Box<dyn Signer>> {
        Some(Box::new(HmacSigner::new(key)))
    }

    #[tokio::test]
    async fn test_update_counter_accumulates() {
        init_logger!();
        let (store, service) = new_service(None);

        service
            .update(MetricEnvelope::counter("requests", 5))
            .await
            .unwrap();
        let result = service
            .update(MetricEnvelope::counter("requests", 3))
            .await
            .unwrap();

        assert_eq!(MetricEnvelope::counter("requests", 8), result);
        assert_eq!(Ok(8), store.get_counter("requests").await);
    }

    #[tokio::test]
    async fn test_update_gauge_overwrites() {
        init_logger!();
        let (store, service) = new_service(None);

        service
            .update(MetricEnvelope::gauge("temp", 36.6))
            .await
            .unwrap();
        service
            .update(MetricEnvelope::gauge("temp", 37.1))
            .await
            .unwrap();

        assert_eq!(Ok(37.1), store.get_gauge("temp").await);
    }

    #[tokio::test]
    async fn test_update_requires_hash_when_signing() {
        init_logger!();
        let (store, service) = new_service(hmac("k"));

        let result = service.update(MetricEnvelope::gauge("temp", 37.1)).await;
        assert_eq!(Err(ServiceError::InvalidHash), result);
        assert_eq!(
            Err(StorageError::MetricNotFound("temp".to_string())),
            store.get_gauge("temp").await,
            "expected the store to not have been mutated"
        );

        let result = service
            .update(MetricEnvelope::gauge("temp", 37.1).with_hash(
                "f78548f78fe0222966960888093f1d61c261454f6af20271e8acd3f6753e4fcf",
            ))
            .await;
        assert_eq!(
            Ok(MetricEnvelope::gauge("temp", 37.1).with_hash(
                "f78548f78fe0222966960888093f1d61c261454f6af20271e8acd3f6753e4fcf"
            )),
            result
        );
        assert_eq!(Ok(37.1), store.get_gauge("temp").await);
    }

    #[tokio::test]
    async fn test_update_unverified_when_signing() {
        init_logger!();
        let (store, service) = new_service(hmac("k"));

        service
            .update_unverified(MetricEnvelope::counter("requests", 5))
            .await
            .unwrap();
        let result = service
            .update_unverified(MetricEnvelope::counter("requests", 3))
            .await;

        assert_eq!(
            Ok(MetricEnvelope::counter("requests", 8)
                .with_hash(HmacSigner::new("k").generate("requests:counter:8").unwrap())),
            result
        );
        assert_eq!(Ok(8), store.get_counter("requests").await);
    }

    #[tokio::test]
    async fn test_update_unverified_invalid_envelope() {
        init_logger!();
        let (store, service) = new_service(hmac("k"));

        let result = service
            .update_unverified(MetricEnvelope::gauge("temp", f64::NAN))
            .await;

        assert_eq!(
            Some(ErrorKind::ValidationFailure),
            result.err().map(|e| e.kind())
        );
        assert_eq!(
            Err(StorageError::MetricNotFound("temp".to_string())),
            store.get_gauge("temp").await
        );
    }

    #[tokio::test]
    async fn test_update_wrong_hash() {
        init_logger!();
        let (_store, service) = new_service(hmac("k"));
        let envelope = MetricEnvelope::counter("requests", 5)
            .with_hash(HmacSigner::new("other").generate("requests:counter:5").unwrap());

        let result = service.update(envelope).await;

        assert_eq!(Err(ServiceError::InvalidHash), result);
        assert_eq!(
            "hash is not correct",
            result.err().map(|e| e.to_string()).unwrap_or_default()
        );
    }

    #[tokio::test]
    async fn test_update_unknown_type() {
        init_logger!();
        let (_store, service) = new_service(None);
        let mut envelope = MetricEnvelope::gauge("latency", 1.0);
        envelope.metric_type = "histogram".to_string();

        let result = service.update(envelope).await;

        assert_eq!(
            Some(ErrorKind::UnknownMetricKind),
            result.err().map(|e| e.kind())
        );
    }

    #[tokio::test]
    async fn test_update_counter_storage_failure() {
        init_logger!();
        let mut repository = MockRepository::new();
        repository
            .expect_get_counter()
            .withf(|name| name == "requests")
            .times(1)
            .returning(|_| Err(StorageError::Database("connection reset".to_string())));
        repository.expect_upsert_counter().times(0);
        let service = MetricService::new(Arc::new(repository), None);

        let result = service.update(MetricEnvelope::counter("requests", 1)).await;

        assert_eq!(
            Some(ErrorKind::PersistenceFailure),
            result.err().map(|e| e.kind())
        );
    }

    #[tokio::test]
    async fn test_update_signing_failure() {
        init_logger!();
        let mut signer = MockSigner::new();
        signer
            .expect_generate()
            .returning(|_| Err(SigningError::GenerateFailed("unavailable".to_string())));
        let (_store, service) = new_service(Some(Box::new(signer)));

        let result = service.update(MetricEnvelope::gauge("temp", 1.0)).await;

        assert_eq!(
            Err(ServiceError::Signing(SigningError::GenerateFailed(
                "unavailable".to_string()
            ))),
            result
        );
    }

    #[tokio::test]
    async fn test_update_many_aggregates_duplicates() {
        init_logger!();
        let mut repository = MockRepository::new();
        repository
            .expect_get_counter()
            .withf(|name| name == "PollCount")
            .times(1)
            .returning(|_| Ok(10));
        repository
            .expect_upsert_many()
            .withf(|metrics| {
                *metrics
                    == vec![
                        Metric::Gauge(gauge("RandomValue", 0.7)),
                        Metric::Counter(counter("PollCount", 15)),
                    ]
            })
            .times(1)
            .returning(|_| Ok(()));
        let service = MetricService::new(Arc::new(repository), None);

        let result = service
            .update_many(vec![
                MetricEnvelope::gauge("RandomValue", 0.2),
                MetricEnvelope::counter("PollCount", 2),
                MetricEnvelope::gauge("RandomValue", 0.7),
                MetricEnvelope::counter("PollCount", 3),
            ])
            .await;

        assert_eq!(Ok(()), result);
    }

    #[tokio::test]
    async fn test_update_many_new_counter() {
        init_logger!();
        let (store, service) = new_service(None);

        service
            .update_many(vec![
                MetricEnvelope::counter("requests", 5),
                MetricEnvelope::counter("requests", 3),
            ])
            .await
            .unwrap();

        assert_eq!(Ok(8), store.get_counter("requests").await);
    }

    #[tokio::test]
    async fn test_update_many_rejects_whole_batch() {
        init_logger!();
        let signer = HmacSigner::new("k");
        let signed = MetricEnvelope::counter("requests", 5)
            .with_hash(signer.generate("requests:counter:5").unwrap());
        let (store, service) = new_service(hmac("k"));

        let result = service
            .update_many(vec![signed, MetricEnvelope::gauge("temp", 1.0)])
            .await;

        assert_eq!(Err(ServiceError::InvalidHash), result);
        assert_eq!(
            Err(StorageError::MetricNotFound("requests".to_string())),
            store.get_counter("requests").await
        );
    }

    #[tokio::test]
    async fn test_update_many_empty() {
        init_logger!();
        let mut repository = MockRepository::new();
        repository.expect_upsert_many().times(0);
        let service = MetricService::new(Arc::new(repository), None);

        let result = service.update_many(vec![]).await;

        assert_eq!(Ok(()), result);
    }

    #[tokio::test]
    async fn test_value() {
        init_logger!();
        let (store, service) = new_service(hmac("k"));
        store.upsert_gauge(gauge("temp", 37.1)).await.unwrap();
        let result = service
            .value(MetricEnvelope::query("gauge", "temp"))
            .await
            .unwrap();

        assert_eq!(
            MetricEnvelope::gauge("temp", 37.1).with_hash(
                "f78548f78fe0222966960888093f1d61c261454f6af20271e8acd3f6753e4fcf"
            ),
            result
        );
    }

    #[tokio::test]
    async fn test_value_missing() {
        init_logger!();
        let (_store, service) = new_service(None);

        let result = service.value(MetricEnvelope::query("counter", "missing")).await;

        assert_eq!(Err(ServiceError::NotFound("missing".to_string())), result);
    }

    #[tokio::test]
    async fn test_listings_are_sorted() {
        init_logger!();
        let (store, service) = new_service(None);
        for name in ["c", "a", "b"] {
            store.upsert_gauge(gauge(name, 1.0)).await.unwrap();
            store.upsert_counter(counter(name, 1)).await.unwrap();
        }

        let gauges = service.gauges().await.unwrap();
        let counters = service.counters().await.unwrap();

        assert_eq!(
            vec!["a", "b", "c"],
            gauges.iter().map(|e| e.name.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(
            vec!["a", "b", "c"],
            counters.iter().map(|e| e.name.as_str()).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_healthcheck() {
        init_logger!();
        let mut repository = MockRepository::new();
        repository
            .expect_healthcheck()
            .times(1)
            .returning(|| Err(StorageError::Database("timeout".to_string())));
        let service = MetricService::new(Arc::new(repository), None);

        let result = service.healthcheck().await;

        assert_eq!(
            Err(ServiceError::Persistence(StorageError::Database(
                "timeout".to_string()
            ))),
            result
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_counter_updates() {
        init_logger!();
        let (store, service) = new_service(None);
        let service = Arc::new(service);
        let mut handles = vec![];

        for _ in 0..10 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    service
                        .update(MetricEnvelope::counter("requests", 1))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(Ok(200), store.get_counter("requests").await);
    }
}
