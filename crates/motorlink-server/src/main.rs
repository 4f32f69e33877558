//! motorlink gateway server
//!
//! Finds the motor board on a serial port, polls it in the background and
//! serves the HTTP/WebSocket API.
//!
//! ```bash
//! motorlink-server --config motorlink.json
//! motorlink-server --list-ports
//! RUST_LOG=motorlink_core=debug motorlink-server --origin http://localhost:8080
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use motorlink_core::prelude::*;
use motorlink_core::protocol::list_ports;
use motorlink_server::{build_router, AppState, GatewayConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Serial-to-network gateway for the motor board
#[derive(Parser)]
#[command(name = "motorlink-server")]
#[command(version)]
#[command(about = "Serial-to-network gateway for a UART motor-control board")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long)]
    bind: Option<String>,

    /// Allowed cross-origin caller, overrides the config file
    #[arg(long)]
    origin: Option<String>,

    /// Print the available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in [
        format!("motorlink_core={level}"),
        format!("motorlink_server={level}"),
        format!("tower_http={level}"),
    ] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Gracefully shutting down...");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list_ports {
        for port in list_ports() {
            println!("{}\t{}", port.name, port.description());
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            GatewayConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(origin) = cli.origin {
        config.allowed_origin = origin;
    }
    config.validate()?;

    info!("motorlink {}", motorlink_core::VERSION);

    let ctx = Arc::new(GatewayContext::new(config.timing()));
    let manager = ConnectionManager::new(SystemPorts, config.serial_settings(), ctx.clone());
    tokio::spawn(manager.run());
    Poller::new(ctx.clone()).spawn();

    let state = AppState::new(
        Gateway::new(ctx),
        config.origin_header()?,
        &config.notification_message,
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    info!(
        "listening on {} (allowed origin {})",
        config.bind_address, config.allowed_origin
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
