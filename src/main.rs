use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use transcriber_relay::{create_router, AppState, Config};

/// WebSocket relay between call audio and a streaming recognition service
#[derive(Debug, Parser)]
#[command(name = "transcriber-relay", version)]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/transcriber-relay")]
    config: String,

    /// Override the HTTP port from the configuration file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }
    cfg.require_api_key()?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let state = AppState::new(Arc::new(cfg));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, router)
        .await
        .context("HTTP server error")?;

    Ok(())
}
