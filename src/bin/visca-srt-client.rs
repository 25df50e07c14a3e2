//! VISCA-SRT client binary
//!
//! Runs next to the controllers: loads the JSON configuration, dials the
//! peer server over SRT, and listens for controllers until SIGINT or
//! SIGTERM.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use visca_srt::client::{ClientConfig, ViscaSrtClient};

#[derive(Parser, Debug)]
#[command(
    name = "visca-srt-client",
    version,
    about = "Tunnel VISCA camera control and NDI tally over SRT (controller side)"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "/etc/visca_srt/client_config.json")]
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
    let config = ClientConfig::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;

    let client = ViscaSrtClient::new(config)?;
    let shutdown = client.shutdown_token();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });

    client.run().await?;
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
