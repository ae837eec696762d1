//! passport-server: REST front end for passport-core

mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use passport_core::api::create_router;
use passport_core::PassportConfig;

use crate::logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};

#[derive(Parser, Debug)]
#[command(name = "passport-server", version, about = "Session and identity service")]
struct Args {
    /// TOML configuration file; PASSPORT_* environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `api_bind_address` from the configuration
    #[arg(short, long)]
    bind: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = parse_log_level(&args.log_level)?;
    setup_logging(&LoggingConfig::new(level).with_json(args.json_logs))?;
    log_welcome("passport-server", env!("CARGO_PKG_VERSION"));

    let mut config = PassportConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.api_bind_address = bind;
    }

    let state = passport_core::init(&config)
        .await
        .context("failed to initialize passport service")?;
    let app = create_router(state);

    let listener = TcpListener::bind(&config.api_bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.api_bind_address))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
