use std::fmt::{Debug, Formatter};
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, trace};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Connection};

use crate::core::event::{Event, EventPayload, Observer, Observers};
use crate::core::metrics::{CounterMetric, GaugeMetric, Metric, MetricType};
use crate::core::storage;
use crate::core::storage::{Repository, StorageError};

const BACKEND_POSTGRES: &str = "PostgreSQL";
const BACKEND_SQLITE: &str = "SQLite";
const HEALTHCHECK_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_CONNECTIONS: u32 = 10;

const CREATE_UNIQUE_INDEX_SQL: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS name_type_unique ON metric (name, type)";
const UPSERT_GAUGE_SQL: &str = "INSERT INTO metric (name, type, value) VALUES ($1, $2, $3) \
    ON CONFLICT (name, type) DO UPDATE SET value = EXCLUDED.value";
const UPSERT_COUNTER_SQL: &str = "INSERT INTO metric (name, type, delta) VALUES ($1, $2, $3) \
    ON CONFLICT (name, type) DO UPDATE SET delta = EXCLUDED.delta";

static INSTALL_DRIVERS: Once = Once::new();

/// A metric store backed by a relational database.
///
/// Metrics are kept in a single `metric` table which is unique on the combination of name and type.
/// PostgreSQL and SQLite databases are supported.
pub struct DatabaseStore {
    pool: AnyPool,
    observers: Observers,
}

impl DatabaseStore {
    /// Connect to the database of the given DSN and create the schema when needed.
    pub async fn connect(dsn: &str) -> storage::Result<Self> {
        install_drivers();
        debug!("Connecting to metrics database");
        let pool = AnyPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(dsn)
            .await?;

        Self::new(pool).await
    }

    /// Create a new store for the given connection pool and create the schema when needed.
    pub async fn new(pool: AnyPool) -> storage::Result<Self> {
        let store = Self {
            pool,
            observers: Default::default(),
        };

        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> storage::Result<()> {
        let backend = {
            let conn = self.pool.acquire().await?;
            conn.backend_name().to_string()
        };
        let id_column = match backend.as_str() {
            BACKEND_POSTGRES => "id SERIAL PRIMARY KEY",
            BACKEND_SQLITE => "id INTEGER PRIMARY KEY AUTOINCREMENT",
            _ => {
                return Err(StorageError::Database(format!(
                    "database backend {} is not supported",
                    backend
                )))
            }
        };

        trace!("Creating metric schema for {}", backend);
        sqlx::query(
            format!(
                "CREATE TABLE IF NOT EXISTS metric ({}, name VARCHAR(255) NOT NULL, \
                type VARCHAR(255) NOT NULL, value DOUBLE PRECISION, delta BIGINT)",
                id_column
            )
            .as_str(),
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(CREATE_UNIQUE_INDEX_SQL)
            .execute(&self.pool)
            .await?;

        info!("Metric database schema is ready on {}", backend);
        Ok(())
    }
}

#[async_trait]
impl Repository for DatabaseStore {
    async fn upsert_gauge(&self, metric: GaugeMetric) -> storage::Result<()> {
        Metric::Gauge(metric.clone()).validate()?;
        trace!("Upserting {}", metric);
        sqlx::query(UPSERT_GAUGE_SQL)
            .bind(metric.name.as_str())
            .bind(MetricType::Gauge.as_str())
            .bind(metric.value)
            .execute(&self.pool)
            .await?;

        self.observers
            .notify(Event::AfterUpsert(EventPayload::Gauge(metric)))
    }

    async fn upsert_counter(&self, metric: CounterMetric) -> storage::Result<()> {
        Metric::Counter(metric.clone()).validate()?;
        trace!("Upserting {}", metric);
        sqlx::query(UPSERT_COUNTER_SQL)
            .bind(metric.name.as_str())
            .bind(MetricType::Counter.as_str())
            .bind(metric.value)
            .execute(&self.pool)
            .await?;

        self.observers
            .notify(Event::AfterUpsert(EventPayload::Counter(metric)))
    }

    async fn upsert_many(&self, metrics: Vec<Metric>) -> storage::Result<()> {
        for metric in metrics.iter() {
            metric.validate()?;
        }

        trace!("Upserting batch of {} metrics", metrics.len());
        let mut tx = self.pool.begin().await?;
        for metric in metrics.iter() {
            match metric {
                Metric::Gauge(e) => sqlx::query(UPSERT_GAUGE_SQL)
                    .bind(e.name.as_str())
                    .bind(MetricType::Gauge.as_str())
                    .bind(e.value)
                    .execute(&mut *tx)
                    .await?,
                Metric::Counter(e) => sqlx::query(UPSERT_COUNTER_SQL)
                    .bind(e.name.as_str())
                    .bind(MetricType::Counter.as_str())
                    .bind(e.value)
                    .execute(&mut *tx)
                    .await?,
            };
        }
        tx.commit().await?;

        self.observers
            .notify(Event::AfterUpsert(EventPayload::Batch(metrics)))
    }

    async fn get_gauge(&self, name: &str) -> storage::Result<f64> {
        sqlx::query_scalar::<_, f64>("SELECT value FROM metric WHERE type = $1 AND name = $2")
            .bind(MetricType::Gauge.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::MetricNotFound(name.to_string()))
    }

    async fn get_counter(&self, name: &str) -> storage::Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT delta FROM metric WHERE type = $1 AND name = $2")
            .bind(MetricType::Counter.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::MetricNotFound(name.to_string()))
    }

    async fn get_all_gauges(&self) -> storage::Result<Vec<GaugeMetric>> {
        Ok(sqlx::query_as::<_, (String, f64)>(
            "SELECT name, value FROM metric WHERE type = $1 ORDER BY name",
        )
        .bind(MetricType::Gauge.as_str())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(name, value)| GaugeMetric::new(name, value))
        .collect())
    }

    async fn get_all_counters(&self) -> storage::Result<Vec<CounterMetric>> {
        Ok(sqlx::query_as::<_, (String, i64)>(
            "SELECT name, delta FROM metric WHERE type = $1 ORDER BY name",
        )
        .bind(MetricType::Counter.as_str())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(name, value)| CounterMetric::new(name, value))
        .collect())
    }

    fn add_observer(&self, observer: Box<dyn Observer>) {
        self.observers.add(observer);
    }

    async fn healthcheck(&self) -> storage::Result<()> {
        tokio::time::timeout(HEALTHCHECK_TIMEOUT, async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await
        })
        .await
        .map_err(|_| StorageError::Database("healthcheck timed out".to_string()))??;

        Ok(())
    }
}

impl Debug for DatabaseStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseStore")
            .field("pool_size", &self.pool.size())
            .field("observers", &self.observers)
            .finish()
    }
}

fn install_drivers() {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
}
