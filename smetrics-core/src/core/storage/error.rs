use thiserror::Error;

/// The result type for storage actions.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    /// The requested metric name is absent in the namespace of its type.
    #[error("metric {0} not found")]
    MetricNotFound(String),
    /// The metric cannot be stored, e.g. an empty name.
    #[error("metric is invalid, {0}")]
    InvalidMetric(String),
    /// The given `filename` couldn't be found.
    #[error("filename {0} not found")]
    FileNotFound(String),
    /// The given `filename` contains invalid data, it returned `error_message` while reading/parsing.
    #[error("filename {0} is corrupt and cannot be read, {1}")]
    ReadingFailed(String, String),
    /// The given `file_path` couldn't be written, it returned `error_message` while writing.
    #[error("failed to write to {0}, {1}")]
    WritingFailed(String, String),
    /// The database backend returned an error.
    #[error("database operation failed, {0}")]
    Database(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(value: sqlx::Error) -> Self {
        StorageError::Database(value.to_string())
    }
}
