// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 emunwa Contributors

// emunwa mock server
// Stand-in emulator for trying front ends without a real one

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emunwa_mock_server::{default_cores, MockEmulator, MockServer, ServerConfig};

#[derive(Parser)]
#[command(name = "emunwa-mock")]
#[command(about = "In-memory emulator speaking the emulator network access protocol", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Core to load at startup; pass an empty string for none
    #[arg(long)]
    core: Option<String>,

    /// Config file (default: ~/.config/emunwa/mock.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emunwa_mock_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("emunwa mock server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(core) = cli.core {
        config.initial_core = core;
    }
    config.validate()?;

    let mut emulator = MockEmulator::new(default_cores());
    emulator.load_core(&config.initial_core);
    if config.initial_core.is_empty() {
        info!("Starting without a core");
    } else {
        info!("Loaded core: {}", config.initial_core);
    }

    let server = MockServer::bind(&config.bind_address, emulator).await?;
    server.run_until(wait_for_shutdown()).await?;

    info!("Mock server shut down");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => tracing::warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C, shutting down");
}
