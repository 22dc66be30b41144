//! numismatic feed recorder - entry point.

use anyhow::{bail, Result};
use clap::Parser;
use numis_recorder::{Recorder, RecorderConfig};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Record exchange websocket feeds to raw capture files.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via NUMIS_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured symbols
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Override the capture directory
    #[arg(long)]
    capture_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any websocket connection.
    numis_ws::init_crypto();

    let args = Args::parse();

    numis_telemetry::init_logging()?;

    info!("Starting numis-recorder v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > NUMIS_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("NUMIS_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let mut config = RecorderConfig::from_file(&config_path)?;
    if !args.symbols.is_empty() {
        config.symbols = args.symbols;
    }
    if let Some(dir) = args.capture_dir {
        config.capture.directory = Some(dir);
    }
    config.validate()?;
    info!(exchange = %config.exchange, symbols = ?config.symbols, "Configuration loaded");

    let recorder = Recorder::new(config)?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        }
        ctrl_c.cancel();
    });

    let report = recorder.run(shutdown).await?;
    if !report.is_success() {
        bail!("{} listener(s) failed: {:?}", report.failures.len(), report.failures);
    }

    Ok(())
}
