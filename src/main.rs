//! Transit indicators API server.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use transit_indicators::config::{load_config, ServiceConfig};
use transit_indicators::lifecycle::{shutdown_signal, Shutdown};
use transit_indicators::observability::{logging, metrics};
use transit_indicators::HttpServer;

#[derive(Parser)]
#[command(name = "transit-indicators")]
#[command(about = "REST API for transit indicator data", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "transit-indicators starting");

    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Configuration loaded");
    }
    if config.auth.admin_password.is_empty() {
        tracing::warn!("auth.admin_password is empty; no administrator account will be created");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let grace = Duration::from_secs(config.timeouts.shutdown_secs);
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => shutdown.trigger(),
    }

    match tokio::time::timeout(grace, server_task).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(grace_secs = grace.as_secs(), "Shutdown deadline exceeded, exiting"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
