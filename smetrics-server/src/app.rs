use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use smetrics_core::core::event::LogObserver;
use smetrics_core::core::service::MetricService;
use smetrics_core::core::signing::{HmacSigner, Signer};
use smetrics_core::core::storage::{
    DatabaseStore, FilePersister, MemoryStore, Repository, StorageError,
};
use tokio::net::TcpListener;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::args::ServerArgs;
use crate::errors::Result;
use crate::server;

/// The in-memory store together with its snapshot file.
#[derive(Debug, Clone)]
struct Snapshot {
    store: Arc<MemoryStore>,
    persister: Arc<FilePersister>,
}

impl Snapshot {
    fn flush(&self) -> std::result::Result<(), StorageError> {
        self.persister.flush(&self.store)
    }
}

/// The metrics server application, wiring the configured store into the HTTP surface.
#[derive(Debug)]
pub struct MetricsApp {
    service: Arc<MetricService>,
    snapshot: Option<Snapshot>,
    store_interval: Duration,
}

impl MetricsApp {
    /// Create the application for the given startup options.
    ///
    /// A database DSN selects the database store, otherwise the in-memory store is used
    /// which is optionally restored from, and persisted to, the store file.
    pub async fn new(args: &ServerArgs) -> Result<Self> {
        let signer: Option<Box<dyn Signer>> = if args.key.is_empty() {
            debug!("No signing key configured, metrics won't be signed");
            None
        } else {
            info!("Metrics will be signed and verified");
            Some(Box::new(HmacSigner::new(args.key.as_str())))
        };

        let mut snapshot = None;
        let repository: Arc<dyn Repository> = if args.is_database() {
            info!("Using the database metric store");
            Arc::new(DatabaseStore::connect(args.database_dsn.as_str()).await?)
        } else if args.is_file_persisted() {
            info!(
                "Using the in-memory metric store persisted to {:?}",
                args.store_file
            );
            let persister = Arc::new(FilePersister::new(&args.store_file));
            let store = MemoryStore::builder()
                .persister(persister.clone())
                .restore(args.restore)
                .synchronous_persist(args.store_interval.is_zero())
                .build()?;
            snapshot = Some(Snapshot {
                store: store.clone(),
                persister,
            });
            store
        } else {
            info!("Using the in-memory metric store without persistence");
            Arc::new(MemoryStore::new())
        };
        repository.add_observer(Box::new(LogObserver));

        Ok(Self {
            service: Arc::new(MetricService::new(repository, signer)),
            snapshot,
            store_interval: args.store_interval,
        })
    }

    /// Returns the metric service of the application.
    pub fn service(&self) -> Arc<MetricService> {
        self.service.clone()
    }

    /// Serve the metrics API on the given listener until the token is cancelled.
    /// The store is flushed a final time after the server has been stopped.
    pub async fn run(self, listener: TcpListener, cancellation_token: CancellationToken) -> Result<()> {
        let flush_loop = self.start_flush_loop(cancellation_token.clone());
        let result = server::serve(listener, self.service.clone(), cancellation_token.clone()).await;

        cancellation_token.cancel();
        if let Some(handle) = flush_loop {
            if let Err(e) = handle.await {
                warn!("Flush loop terminated unexpectedly, {}", e);
            }
        }
        if let Some(snapshot) = self.snapshot.as_ref() {
            match snapshot.flush() {
                Ok(_) => info!("Metrics have been flushed to {}", snapshot.persister),
                Err(e) => error!("Failed to flush metrics on shutdown, {}", e),
            }
        }

        Ok(result?)
    }

    fn start_flush_loop(&self, cancellation_token: CancellationToken) -> Option<JoinHandle<()>> {
        let snapshot = self.snapshot.clone()?;
        if self.store_interval.is_zero() {
            return None;
        }

        let period = self.store_interval;
        debug!("Flushing metrics every {:?} to {}", period, snapshot.persister);
        Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = snapshot.flush() {
                            error!("Failed to flush metrics, {}", e);
                        }
                    }
                }
            }
            debug!("Metrics flush loop has been stopped");
        }))
    }
}
