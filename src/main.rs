//! HLS Audio Streaming Server
//!
//! A Rust-based personal music library server that streams audio over
//! HLS, transcoding on demand with an external transcoder and caching
//! the resulting playlists and segments on disk.

#![allow(dead_code)]

mod config;
mod config_file;
mod error;
mod hls;
mod http;
mod janitor;
mod library;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::error::{Result, StreamError};
use crate::http::create_router;
use crate::janitor::Janitor;
use crate::library::FsLibrary;
use crate::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "hls-audio-server";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    tracing::info!("{} v{} starting", APP_NAME, VERSION);

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        match crate::config_file::ConfigFile::from_file(&config_path) {
            Ok(cf) => cf.into_server_config(),
            Err(e) => {
                tracing::warn!(
                    "Failed to load config file {}: {}. Using defaults.",
                    config_path,
                    e
                );
                ServerConfig::default()
            }
        }
    } else {
        ServerConfig::default()
    };
    tracing::info!("Configuration loaded: {:?}", config);
    tracing::info!(
        "Transcoder: {}",
        config.transcoder.effective_path().display()
    );

    // Create application state
    let library = Arc::new(FsLibrary::new(config.library_root.clone()));
    let state = Arc::new(AppState::new(config.clone(), library)?);

    // Background janitor: sweeps expired cache variants
    let janitor = Janitor::spawn(Arc::clone(&state.cache));

    // Build router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| StreamError::Config(format!("invalid listen address: {}", e)))?;
    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Joined on teardown so an in-flight sweep finishes cleanly
    janitor.shutdown().await;
    tracing::info!("{} stopped", APP_NAME);

    Ok(())
}

/// Wait for Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install shutdown signal handler: {}", e);
    }
}

/// Initialize logging with tracing
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hls_audio_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
