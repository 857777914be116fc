use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;
use smetrics_core::core::utils::parse_positive_duration;

/// The startup options of the metrics agent.
#[derive(Debug, Clone, Parser)]
#[command(name = "smetrics-agent", version, about = "Polls metrics and reports them to the metrics server")]
pub struct AgentArgs {
    /// The address of the metrics server.
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "http://localhost:8080")]
    pub address: String,
    /// The interval between reports to the server.
    #[arg(
        short = 'r',
        long = "report-interval",
        env = "REPORT_INTERVAL",
        default_value = "10s",
        value_parser = parse_positive_duration
    )]
    pub report_interval: Duration,
    /// The interval between metric polls.
    #[arg(
        short = 'p',
        long = "poll-interval",
        env = "POLL_INTERVAL",
        default_value = "2s",
        value_parser = parse_positive_duration
    )]
    pub poll_interval: Duration,
    /// The shared secret used to sign metrics, an empty value disables signing.
    #[arg(short = 'k', long, env = "KEY", default_value = "", hide_env_values = true)]
    pub key: String,
    /// The root log level.
    #[arg(long, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
    /// The log4rs config file to load instead of the default logging config.
    #[arg(long)]
    pub log_config: Option<PathBuf>,
}
