use derive_more::Display;
use thiserror::Error;

use crate::core::metrics::UnknownMetricType;
use crate::core::signing::SigningError;
use crate::core::storage::StorageError;

/// The result type for metric service actions.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// The message of a rejected signature, independent of why the signature was rejected.
pub const INVALID_HASH_MESSAGE: &str = "hash is not correct";

/// The category of a [ServiceError], used by the boundary to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    #[display("not found")]
    NotFound,
    #[display("unknown metric kind")]
    UnknownMetricKind,
    #[display("validation failure")]
    ValidationFailure,
    #[display("persistence failure")]
    PersistenceFailure,
    #[display("internal failure")]
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// The requested metric doesn't exist.
    #[error("metric {0} not found")]
    NotFound(String),
    /// The metric type is neither a gauge nor a counter.
    #[error("unknown metric type")]
    UnknownMetricType(String),
    /// The metric payload is malformed.
    #[error("{0}")]
    Validation(String),
    /// The metric hash is missing or doesn't match the payload.
    #[error("{}", INVALID_HASH_MESSAGE)]
    InvalidHash,
    /// The store failed to persist or retrieve the metric.
    #[error("{0}")]
    Persistence(StorageError),
    /// The response couldn't be signed.
    #[error("{0}")]
    Signing(SigningError),
}

impl ServiceError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::UnknownMetricType(_) => ErrorKind::UnknownMetricKind,
            ServiceError::Validation(_) | ServiceError::InvalidHash => {
                ErrorKind::ValidationFailure
            }
            ServiceError::Persistence(_) => ErrorKind::PersistenceFailure,
            ServiceError::Signing(_) => ErrorKind::Internal,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::MetricNotFound(name) => ServiceError::NotFound(name),
            StorageError::InvalidMetric(reason) => ServiceError::Validation(reason),
            _ => ServiceError::Persistence(value),
        }
    }
}

impl From<UnknownMetricType> for ServiceError {
    fn from(value: UnknownMetricType) -> Self {
        ServiceError::UnknownMetricType(value.0)
    }
}

impl From<SigningError> for ServiceError {
    fn from(value: SigningError) -> Self {
        ServiceError::Signing(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_storage_error() {
        assert_eq!(
            ServiceError::NotFound("requests".to_string()),
            ServiceError::from(StorageError::MetricNotFound("requests".to_string()))
        );
        assert_eq!(
            ErrorKind::PersistenceFailure,
            ServiceError::from(StorageError::Database("connection reset".to_string())).kind()
        );
        assert_eq!(
            ErrorKind::ValidationFailure,
            ServiceError::from(StorageError::InvalidMetric("empty name".to_string())).kind()
        );
    }

    #[test]
    fn test_invalid_hash_message() {
        assert_eq!("hash is not correct", ServiceError::InvalidHash.to_string());
        assert_eq!(ErrorKind::ValidationFailure, ServiceError::InvalidHash.kind());
    }

    #[test]
    fn test_unknown_metric_type() {
        let result = ServiceError::from(UnknownMetricType("histogram".to_string()));

        assert_eq!("unknown metric type", result.to_string());
        assert_eq!(ErrorKind::UnknownMetricKind, result.kind());
    }
}
