//! VISCA-SRT server binary
//!
//! Runs next to the cameras: loads the JSON configuration, dials every
//! camera, listens for SRT peers, and drives tally lamps until SIGINT or
//! SIGTERM.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use visca_srt::server::{ServerConfig, ViscaSrtServer};

#[derive(Parser, Debug)]
#[command(
    name = "visca-srt-server",
    version,
    about = "Tunnel VISCA camera control and NDI tally over SRT (camera side)"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "/etc/visca_srt/server_config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;

    let server = ViscaSrtServer::new(config)?;
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });

    server.run().await?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(error) => {
            tracing::warn!(%error, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
