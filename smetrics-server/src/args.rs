use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use log::LevelFilter;
use smetrics_core::core::utils::parse_duration;

/// The startup options of the metrics server.
///
/// Each option can also be provided through its environment variable, an explicit flag
/// takes precedence over the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "smetrics-server", version, about = "Stores and serves reported metrics")]
pub struct ServerArgs {
    /// The address on which the server listens.
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "localhost:8080")]
    pub address: String,
    /// Restore the metrics from the store file on startup.
    #[arg(short = 'r', long, env = "RESTORE", default_value_t = true, action = ArgAction::Set)]
    pub restore: bool,
    /// The snapshot file of the in-memory store, an empty value disables persistence.
    #[arg(
        short = 'f',
        long = "store-file",
        env = "STORE_FILE",
        default_value = "/tmp/devops-metrics-db.json"
    )]
    pub store_file: PathBuf,
    /// The interval between snapshots, `0` writes a snapshot on every update.
    #[arg(
        short = 'i',
        long = "store-interval",
        env = "STORE_INTERVAL",
        default_value = "300s",
        value_parser = parse_duration
    )]
    pub store_interval: Duration,
    /// The shared secret used to sign and verify metrics, an empty value disables signing.
    #[arg(short = 'k', long, env = "KEY", default_value = "", hide_env_values = true)]
    pub key: String,
    /// The DSN of the metrics database, an empty value uses the in-memory store.
    #[arg(short = 'd', long = "database-dsn", env = "DATABASE_DSN", default_value = "")]
    pub database_dsn: String,
    /// The root log level.
    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
    /// The log4rs config file to load instead of the default logging config.
    #[arg(long)]
    pub log_config: Option<PathBuf>,
    /// The file to which the logs are also written.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl ServerArgs {
    /// Returns `true` when the metrics are stored in a database.
    pub fn is_database(&self) -> bool {
        !self.database_dsn.trim().is_empty()
    }

    /// Returns `true` when the in-memory store is persisted to a snapshot file.
    pub fn is_file_persisted(&self) -> bool {
        !self.store_file.as_os_str().is_empty()
    }
}
