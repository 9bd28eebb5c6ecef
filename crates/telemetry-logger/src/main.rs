//! Vehicle Telemetry Logger - Main Entry Point
//!
//! Usage: `telemetry-logger [config.toml]`

use anyhow::Context;
use std::path::PathBuf;
use telemetry_logger::{init_logging, open_transport, run, LoggerConfig, NoFix};
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = LoggerConfig::load(config_path.as_deref()).context("loading configuration")?;
    init_logging(&config.log_level)?;

    info!("=== Telemetry Logger v{} ===", env!("CARGO_PKG_VERSION"));

    let transport = open_transport(&config.adapter)
        .with_context(|| format!("opening adapter {}", config.adapter.device))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown requested");
        let _ = stop_tx.send(true);
    });

    run(config, transport, NoFix, stop_rx).await?;
    Ok(())
}
