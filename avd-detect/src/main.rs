//! AI Voice Detection service (avd-detect) - Main entry point
//!
//! Loads the speech encoder and scorer head once, then serves
//! POST /api/voice-detection until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use avd_common::config::{load_or_default, resolve_log_level, ConfigOverrides, ServiceConfig};
use avd_detect::{build_router, AppState, VoiceDetector};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for avd-detect
///
/// The API key may also come from `AVD_API_KEY` or the TOML file; the model
/// directory from `AVD_MODEL_DIR`.
#[derive(Parser, Debug)]
#[command(name = "avd-detect")]
#[command(about = "Language-agnostic AI-generated voice detection service")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/avd/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "AVD_BIND_ADDRESS")]
    bind_address: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "AVD_PORT")]
    port: Option<u16>,

    /// API key clients must send in x-api-key
    #[arg(long)]
    api_key: Option<String>,

    /// Directory holding config.json, model.safetensors and scorer.safetensors
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "AVD_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let default_level = resolve_log_level(args.log_level.as_deref(), &toml_config);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("avd_detect={lvl},avd_common={lvl},tower_http={lvl}", lvl = default_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting AVD detection service (avd-detect) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let overrides = ConfigOverrides {
        bind_address: args.bind_address,
        port: args.port,
        api_key: args.api_key,
        model_dir: args.model_dir,
    };
    let config = ServiceConfig::resolve(&overrides, toml_config).context("Invalid configuration")?;

    info!(
        encoder_config = %config.model_paths.encoder_config.display(),
        encoder_weights = %config.model_paths.encoder_weights.display(),
        scorer_weights = %config.model_paths.scorer_weights.display(),
        "Loading models"
    );

    // Model load failure is fatal: never bind without a working pipeline
    let detector = VoiceDetector::load(
        &config.model_paths,
        &config.scorer_hidden,
        config.weight_prefix.as_deref(),
    )
    .context("Failed to load detection models")?;

    let state = AppState::new(Arc::new(detector), &config.api_key, config.max_body_bytes);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}:{}", config.bind_address, config.port))?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
