//! AeroNyx node monitor - Entry Point

use aeronyx_rest::MAX_HISTORY_HOURS;
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

/// AeroNyx node monitor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via AERONYX_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Live dashboard until Ctrl+C (default)
    Monitor,
    /// Fetch the nodes overview once and print the dashboard view
    Overview,
    /// Detailed status of one node
    Status {
        /// Node reference code
        reference_code: String,
    },
    /// Performance history of one node
    History {
        /// Node reference code
        reference_code: String,
        /// Window in hours
        #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..=MAX_HISTORY_HOURS as i64))]
        hours: u32,
    },
    /// List node types
    NodeTypes,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    aeronyx_ws::init_crypto();

    let args = Args::parse();

    // Initialize logging
    aeronyx_telemetry::init_logging(None)?;

    info!("Starting AeroNyx monitor v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > AERONYX_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("AERONYX_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = aeronyx_monitor::AppConfig::load(&config_path)?;
    info!(api_url = %config.api.api_url, ws_url = %config.websocket.url, "Configuration loaded");

    let app = aeronyx_monitor::Application::from_config(config)?;

    match args.command.unwrap_or(Command::Monitor) {
        Command::Monitor => app.run().await?,
        Command::Overview => print_json(&app.overview().await?)?,
        Command::Status { reference_code } => print_json(&app.node_status(&reference_code).await?)?,
        Command::History {
            reference_code,
            hours,
        } => print_json(&app.node_history(&reference_code, hours).await?)?,
        Command::NodeTypes => print_json(&app.node_types().await?)?,
    }

    Ok(())
}
