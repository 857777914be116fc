use std::fmt::Debug;

use async_trait::async_trait;
use log::{debug, trace};
#[cfg(test)]
use mockall::automock;
use reqwest::{Client, StatusCode};
use smetrics_core::core::metrics::Metric;
use smetrics_core::core::service::MetricEnvelope;
use smetrics_core::core::signing::{HmacSigner, Signer};
use url::Url;

use crate::errors::{AgentError, Result};

const UPDATES_PATH: &str = "updates/";
const DEFAULT_SCHEME: &str = "http";
const SCHEME_SEPARATOR: &str = "://";

/// Delivers batches of metrics to the metrics server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricReporter: Debug + Send + Sync {
    /// Send the given metrics as a single batch.
    async fn send(&self, metrics: Vec<Metric>) -> Result<()>;
}

/// The HTTP client of the metrics server batch API.
#[derive(Debug)]
pub struct MetricClient {
    client: Client,
    updates_url: Url,
    signer: Option<Box<dyn Signer>>,
}

impl MetricClient {
    /// Create a new client for the server at the given address.
    /// The metrics are signed when the key is not empty.
    ///
    /// It returns [AgentError::InvalidAddress] when the address is not a valid http(s) url.
    pub fn new(address: &str, key: &str) -> Result<Self> {
        let signer: Option<Box<dyn Signer>> = if key.is_empty() {
            None
        } else {
            Some(Box::new(HmacSigner::new(key)))
        };
        let updates_url = parse_address(address)?
            .join(UPDATES_PATH)
            .map_err(|e| AgentError::InvalidAddress(address.to_string(), e.to_string()))?;

        Ok(Self {
            client: Client::new(),
            updates_url,
            signer,
        })
    }

    /// Returns the url to which the metric batches are sent.
    pub fn updates_url(&self) -> &Url {
        &self.updates_url
    }

    fn envelope(&self, metric: Metric) -> Result<MetricEnvelope> {
        let envelope = MetricEnvelope::from(metric);
        match self.signer.as_ref() {
            None => Ok(envelope),
            Some(signer) => {
                let canonical = envelope
                    .canonical()
                    .map_err(|e| AgentError::invalid_metric(envelope.id.as_str(), e))?;
                let hash = signer.generate(canonical.as_str())?;
                Ok(envelope.with_hash(hash))
            }
        }
    }
}

#[async_trait]
impl MetricReporter for MetricClient {
    async fn send(&self, metrics: Vec<Metric>) -> Result<()> {
        let envelopes = metrics
            .into_iter()
            .map(|e| self.envelope(e))
            .collect::<Result<Vec<_>>>()?;

        trace!("Sending {} metrics to {}", envelopes.len(), self.updates_url);
        let response = self
            .client
            .post(self.updates_url.clone())
            .json(&envelopes)
            .send()
            .await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AgentError::UnexpectedStatus(status.as_u16()));
        }

        debug!("Reported {} metrics to {}", envelopes.len(), self.updates_url);
        Ok(())
    }
}

/// Parse the server address, an address without scheme is prefixed with `http://`.
/// The path of the parsed url always ends with a `/` so it can be joined with the api paths.
fn parse_address(address: &str) -> Result<Url> {
    let trimmed = address.trim();
    let mut url = if trimmed.contains(SCHEME_SEPARATOR) {
        Url::parse(trimmed)
    } else {
        Url::parse(format!("{}{}{}", DEFAULT_SCHEME, SCHEME_SEPARATOR, trimmed).as_str())
    }
    .map_err(|e| AgentError::InvalidAddress(address.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AgentError::InvalidAddress(
            address.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(path.as_str());
    }

    Ok(url)
}
