//! imgveil server
//!
//! Serves one image to browsers as independently encrypted chunks, keyed
//! per session by an ephemeral ECDH exchange.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use imgveil_core::config::load_config;
use imgveil_core::tracing_init::init_tracing;
use imgveil_core::{DeliveryService, ImageAsset, SessionStore};
use imgveil_server::{AppState, build_router, spawn_session_sweeper};

#[derive(Parser, Debug)]
#[command(name = "imgveil-server")]
#[command(version, about = "imgveil server - encrypted chunked image delivery")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "LISTEN_ADDR")]
    addr: SocketAddr,

    /// Image to serve
    #[arg(long, default_value = "image.png", env = "IMAGE_PATH")]
    image: PathBuf,

    /// JSON config file (chunk size, session limits)
    #[arg(long, env = "IMGVEIL_CONFIG")]
    config: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("imgveil_server=info", args.log_json);

    let config = load_config(args.config.as_deref())?;
    let asset = ImageAsset::load(&args.image, config.chunk_size).await?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %args.addr,
        image = %args.image.display(),
        bytes = asset.len(),
        chunk_size = asset.chunk_size(),
        total_chunks = asset.total_chunks(),
        "Starting imgveil-server"
    );

    let store = SessionStore::new(&config);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = spawn_session_sweeper(store.clone(), config.sweep_interval(), shutdown_rx);

    let app = build_router(AppState {
        service: DeliveryService::new(store, asset),
    });
    let listener = tokio::net::TcpListener::bind(args.addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    info!("Server stopped");
    Ok(())
}
