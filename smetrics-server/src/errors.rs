use std::io;

use smetrics_core::core::storage::StorageError;
use thiserror::Error;

/// The result type of the metrics server.
pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to initialize the logger, {0}")]
    Logging(#[from] smetrics_logging::LoggingError),
    #[error("failed to initialize the metric store, {0}")]
    Storage(#[from] StorageError),
    #[error("an io error occurred, {0}")]
    Io(#[from] io::Error),
}
