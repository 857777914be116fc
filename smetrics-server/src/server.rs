use std::io;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use itertools::Itertools;
use log::{debug, error, info, trace, warn};
use smetrics_core::core::service::{ErrorKind, MetricEnvelope, MetricService, ServiceError};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;

const GAUGE_TEXT_PRECISION: f64 = 1000.0;

/// Serve the metrics API on the given listener until the token is cancelled.
pub async fn serve(
    listener: TcpListener,
    service: Arc<MetricService>,
    cancellation_token: CancellationToken,
) -> io::Result<()> {
    info!("Metrics server is listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(cancellation_token.cancelled_owned())
        .await?;
    info!("Metrics server has been stopped");
    Ok(())
}

/// Create the router of the metrics API.
///
/// Gzip encoded request bodies are decoded and responses are gzip encoded when the
/// client accepts it.
pub fn router(service: Arc<MetricService>) -> Router {
    Router::new()
        .route("/", get(do_list))
        .route("/ping", get(do_ping))
        .route("/update/{type}/{name}/{value}", post(do_update_text))
        .route("/update", post(do_update))
        .route("/update/", post(do_update))
        .route("/updates", post(do_updates))
        .route("/updates/", post(do_updates))
        .route("/value/{type}/{name}", get(do_value_text))
        .route("/value", post(do_value))
        .route("/value/", post(do_value))
        .with_state(service)
        .layer(CompressionLayer::new())
        .layer(RequestDecompressionLayer::new())
}

/// The error response of the metrics API.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        Self(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self(ServiceError::Validation(value.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::UnknownMetricKind => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::ValidationFailure => StatusCode::BAD_REQUEST,
            ErrorKind::PersistenceFailure | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        match kind {
            ErrorKind::NotFound => debug!("Request failed with {}, {}", kind, self.0),
            ErrorKind::UnknownMetricKind | ErrorKind::ValidationFailure => {
                warn!("Request failed with {}, {}", kind, self.0)
            }
            ErrorKind::PersistenceFailure | ErrorKind::Internal => {
                error!("Request failed with {}, {}", kind, self.0)
            }
        }

        (status, self.0.to_string()).into_response()
    }
}

async fn do_update_text(
    State(service): State<Arc<MetricService>>,
    Path((metric_type, name, value)): Path<(String, String, String)>,
) -> Result<String, ApiError> {
    trace!("Received text update {}/{}/{}", metric_type, name, value);
    let envelope = MetricEnvelope::parse(&metric_type, &name, &value)?;
    let stored = service.update_unverified(envelope).await?;
    Ok(format_value(&stored))
}

async fn do_value_text(
    State(service): State<Arc<MetricService>>,
    Path((metric_type, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let stored = service
        .value(MetricEnvelope::query(metric_type, name))
        .await?;
    Ok(format_value(&stored))
}

async fn do_update(
    State(service): State<Arc<MetricService>>,
    payload: Result<Json<MetricEnvelope>, JsonRejection>,
) -> Result<Json<MetricEnvelope>, ApiError> {
    let Json(envelope) = payload?;
    trace!("Received update {:?}", envelope);
    Ok(Json(service.update(envelope).await?))
}

async fn do_updates(
    State(service): State<Arc<MetricService>>,
    payload: Result<Json<Vec<MetricEnvelope>>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(envelopes) = payload?;
    trace!("Received batch update of {} metrics", envelopes.len());
    service.update_many(envelopes).await?;
    Ok(Json(serde_json::json!({})))
}

async fn do_value(
    State(service): State<Arc<MetricService>>,
    payload: Result<Json<MetricEnvelope>, JsonRejection>,
) -> Result<Json<MetricEnvelope>, ApiError> {
    let Json(envelope) = payload?;
    Ok(Json(service.value(envelope).await?))
}

async fn do_list(State(service): State<Arc<MetricService>>) -> Result<Html<String>, ApiError> {
    let gauges = service
        .gauges()
        .await?
        .iter()
        .map(|e| format!("<li>{}: {}</li>", escape_html(&e.name), round_gauge(e.value)))
        .join("");
    let counters = service
        .counters()
        .await?
        .iter()
        .map(|e| format!("<li>{}: {}</li>", escape_html(&e.name), e.value))
        .join("");

    Ok(Html(format!(
        "<html><head><title>Metrics</title></head><body>\
         <h2>Gauges</h2><ul>{}</ul>\
         <h2>Counters</h2><ul>{}</ul>\
         </body></html>",
        gauges, counters
    )))
}

async fn do_ping(State(service): State<Arc<MetricService>>) -> Result<StatusCode, ApiError> {
    service.healthcheck().await?;
    Ok(StatusCode::OK)
}

fn format_value(envelope: &MetricEnvelope) -> String {
    match (envelope.value, envelope.delta) {
        (Some(value), _) => round_gauge(value).to_string(),
        (None, Some(delta)) => delta.to_string(),
        (None, None) => String::new(),
    }
}

fn round_gauge(value: f64) -> f64 {
    (value * GAUGE_TEXT_PRECISION).round() / GAUGE_TEXT_PRECISION
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
