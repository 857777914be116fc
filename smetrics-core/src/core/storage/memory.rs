use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::core::event::{Event, EventPayload, Observer, Observers};
use crate::core::metrics::{CounterMetric, GaugeMetric, Metric};
use crate::core::storage;
use crate::core::storage::{FilePersister, Repository, StorageError};

/// The gauge and counter mappings of a [MemoryStore], keyed by metric name.
///
/// This is also the document format of a [FilePersister] snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricTables {
    #[serde(default)]
    pub gauge_store: HashMap<String, GaugeMetric>,
    #[serde(default)]
    pub counter_store: HashMap<String, CounterMetric>,
}

impl MetricTables {
    fn apply(&mut self, metric: Metric) {
        match metric {
            Metric::Gauge(e) => {
                self.gauge_store.insert(e.name.clone(), e);
            }
            Metric::Counter(e) => {
                self.counter_store.insert(e.name.clone(), e);
            }
        }
    }
}

/// The in-memory metric store.
///
/// Both mappings are guarded by a single read-write lock, the lock is always released
/// before the observers are notified.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MetricTables>,
    observers: Observers,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a builder for a memory store backed by a snapshot file.
    pub fn builder() -> MemoryStoreBuilder {
        MemoryStoreBuilder::default()
    }

    /// Returns a point-in-time copy of the stored mappings.
    pub fn snapshot(&self) -> MetricTables {
        self.read_tables().clone()
    }

    /// Replace the stored mappings wholesale with the given tables.
    /// Observers are not notified of a replacement.
    pub fn replace(&self, tables: MetricTables) {
        debug!(
            "Replacing memory store with {} gauges and {} counters",
            tables.gauge_store.len(),
            tables.counter_store.len()
        );
        *self.write_tables() = tables;
    }

    fn upsert(&self, metric: Metric) -> storage::Result<()> {
        metric.validate()?;
        trace!("Upserting {}", metric);
        self.write_tables().apply(metric.clone());
        self.observers
            .notify(Event::AfterUpsert(EventPayload::from(metric)))
    }

    fn read_tables(&self) -> RwLockReadGuard<'_, MetricTables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_tables(&self) -> RwLockWriteGuard<'_, MetricTables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn upsert_gauge(&self, metric: GaugeMetric) -> storage::Result<()> {
        self.upsert(Metric::Gauge(metric))
    }

    async fn upsert_counter(&self, metric: CounterMetric) -> storage::Result<()> {
        self.upsert(Metric::Counter(metric))
    }

    async fn upsert_many(&self, metrics: Vec<Metric>) -> storage::Result<()> {
        for metric in metrics.iter() {
            metric.validate()?;
        }

        trace!("Upserting batch of {} metrics", metrics.len());
        {
            let mut tables = self.write_tables();
            for metric in metrics.iter().cloned() {
                tables.apply(metric);
            }
        }

        self.observers
            .notify(Event::AfterUpsert(EventPayload::Batch(metrics)))
    }

    async fn get_gauge(&self, name: &str) -> storage::Result<f64> {
        self.read_tables()
            .gauge_store
            .get(name)
            .map(|e| e.value)
            .ok_or_else(|| StorageError::MetricNotFound(name.to_string()))
    }

    async fn get_counter(&self, name: &str) -> storage::Result<i64> {
        self.read_tables()
            .counter_store
            .get(name)
            .map(|e| e.value)
            .ok_or_else(|| StorageError::MetricNotFound(name.to_string()))
    }

    async fn get_all_gauges(&self) -> storage::Result<Vec<GaugeMetric>> {
        Ok(self.read_tables().gauge_store.values().cloned().collect())
    }

    async fn get_all_counters(&self) -> storage::Result<Vec<CounterMetric>> {
        Ok(self.read_tables().counter_store.values().cloned().collect())
    }

    fn add_observer(&self, observer: Box<dyn Observer>) {
        self.observers.add(observer);
    }
}

/// Flushes the owning [MemoryStore] to its snapshot file after each upsert.
///
/// The observer only holds a weak reference to the store, as it's owned by the store itself.
#[derive(Debug)]
pub struct PersistToFileObserver {
    store: Weak<MemoryStore>,
    persister: Arc<FilePersister>,
}

impl PersistToFileObserver {
    pub fn new(store: &Arc<MemoryStore>, persister: Arc<FilePersister>) -> Self {
        Self {
            store: Arc::downgrade(store),
            persister,
        }
    }
}

impl Observer for PersistToFileObserver {
    fn handle_event(&self, event: &Event) -> storage::Result<()> {
        match event {
            Event::AfterUpsert(_) => match self.store.upgrade() {
                Some(store) => self.persister.flush(&store),
                None => {
                    trace!("Memory store has been dropped, skipping flush");
                    Ok(())
                }
            },
        }
    }
}

/// The builder of a [MemoryStore] which is restored from, or synchronously persisted to, a snapshot file.
#[derive(Debug, Default)]
pub struct MemoryStoreBuilder {
    persister: Option<Arc<FilePersister>>,
    restore: bool,
    synchronous_persist: bool,
}

impl MemoryStoreBuilder {
    /// Set the snapshot file persister of the store.
    pub fn persister(mut self, persister: Arc<FilePersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Set if the store should be restored from the snapshot file on creation.
    pub fn restore(mut self, restore: bool) -> Self {
        self.restore = restore;
        self
    }

    /// Set if the store should be flushed to the snapshot file after each upsert.
    pub fn synchronous_persist(mut self, synchronous_persist: bool) -> Self {
        self.synchronous_persist = synchronous_persist;
        self
    }

    /// Create the memory store.
    ///
    /// A missing snapshot file during restore is not an error, the store starts empty instead.
    /// Any other restore failure is returned.
    pub fn build(self) -> storage::Result<Arc<MemoryStore>> {
        let store = Arc::new(MemoryStore::new());

        if let Some(persister) = self.persister {
            if self.restore {
                match persister.restore(&store) {
                    Ok(_) => info!("Memory store has been restored from {}", persister),
                    Err(StorageError::FileNotFound(path)) => {
                        warn!("Snapshot file {} not found, starting with an empty store", path)
                    }
                    Err(e) => return Err(e),
                }
            }

            if self.synchronous_persist {
                debug!("Enabling synchronous persistence to {}", persister);
                store.add_observer(Box::new(PersistToFileObserver::new(&store, persister)));
            }
        }

        Ok(store)
    }
}
