use crate::agent::MetricAgent;
use crate::args::AgentArgs;
use crate::client::MetricClient;
use crate::errors::Result;
use crate::source::CustomMetricSource;
use clap::Parser;
use log::{error, info};
use smetrics_logging::{Component, MetricsLogger};
use tokio_util::sync::CancellationToken;

mod agent;
mod args;
mod client;
mod errors;
mod source;

#[tokio::main]
async fn main() -> Result<()> {
    let args = AgentArgs::parse();
    let _logger = MetricsLogger::builder(Component::Agent)
        .level(args.log_level)
        .config_file(args.log_config.clone())
        .build()?;

    let client = MetricClient::new(args.address.as_str(), args.key.as_str())?;
    info!(
        "Starting metrics agent v{} reporting to {}",
        smetrics_core::VERSION,
        client.updates_url()
    );
    let agent = MetricAgent::new(vec![Box::new(CustomMetricSource)], Box::new(client));

    let cancellation_token = CancellationToken::new();
    let shutdown_token = cancellation_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(_) => {
                info!("Received shutdown signal, stopping metrics agent");
                shutdown_token.cancel();
            }
            Err(e) => error!("Failed to listen for the shutdown signal, {}", e),
        }
    });

    agent
        .run(args.poll_interval, args.report_interval, cancellation_token)
        .await;
    Ok(())
}
