use smetrics_core::core::service::ServiceError;
use smetrics_core::core::signing::SigningError;
use thiserror::Error;

/// The result type of the metrics agent.
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to initialize the logger, {0}")]
    Logging(#[from] smetrics_logging::LoggingError),
    #[error("invalid server address {0}, {1}")]
    InvalidAddress(String, String),
    #[error("metric {0} cannot be reported, {1}")]
    InvalidMetric(String, String),
    #[error("failed to sign the metrics, {0}")]
    Signing(#[from] SigningError),
    #[error("failed to send the metrics, {0}")]
    Request(#[from] reqwest::Error),
    #[error("server responded with status {0}")]
    UnexpectedStatus(u16),
}

impl AgentError {
    pub(crate) fn invalid_metric(id: &str, err: ServiceError) -> Self {
        Self::InvalidMetric(id.to_string(), err.to_string())
    }
}
