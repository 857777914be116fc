use crate::app::MetricsApp;
use crate::args::ServerArgs;
use crate::errors::Result;
use clap::Parser;
use log::{error, info};
use smetrics_logging::{Component, MetricsLogger};
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod app;
mod args;
mod errors;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    let _logger = MetricsLogger::builder(Component::Server)
        .level(args.log_level)
        .config_file(args.log_config.clone())
        .log_file(args.log_file.clone())
        .build()?;

    let start = Instant::now();
    let app = MetricsApp::new(&args).await?;
    let listener = TcpListener::bind(args.address.as_str()).await?;
    let time_taken = start.elapsed();
    info!(
        "Started metrics server v{} in {}.{:03} seconds",
        smetrics_core::VERSION,
        time_taken.as_secs(),
        time_taken.subsec_millis()
    );

    let cancellation_token = CancellationToken::new();
    let shutdown_token = cancellation_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(_) => {
                info!("Received shutdown signal, stopping metrics server");
                shutdown_token.cancel();
            }
            Err(e) => error!("Failed to listen for the shutdown signal, {}", e),
        }
    });

    app.run(listener, cancellation_token).await
}
