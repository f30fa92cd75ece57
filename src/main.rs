//! snapstream: relays camera snapshot URLs as MJPEG streams

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use snapstream::capture::HttpSnapshotClient;
use snapstream::pipeline::FrameManager;
use snapstream::stream::{self, AppState, StreamSettings};
use snapstream::utils::frame_interval;
use snapstream::Config;

#[derive(Debug, Parser)]
#[command(version, about = "Serve camera snapshot URLs as MJPEG streams")]
struct Cli {
    /// TOML configuration file; a missing file falls back to defaults and environment
    #[arg(short, long, default_value = "snapstream.toml")]
    config: PathBuf,

    /// Override server.port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;
    let cli = Cli::parse();
    let env_file = snapstream::load_env_file(Path::new(".env"))?;

    let mut config = Config::load(Some(cli.config.as_path()))
        .wrap_err_with(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("snapstream={}", config.server.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("snapstream launching...");
    if env_file {
        info!("Loaded environment from .env");
    }

    let client = HttpSnapshotClient::new(&config.client, &config.auth)?;
    let manager = Arc::new(FrameManager::new(
        &config.cameras,
        Arc::new(client),
        config.pipeline.ring_buffer_size,
    ));

    let shutdown = CancellationToken::new();
    let mut fetchers = if config.pipeline.use_cache {
        manager.spawn_fetchers(frame_interval(config.pipeline.fetch_fps), &shutdown)
    } else {
        JoinSet::new()
    };

    let app = stream::router(AppState {
        manager: manager.clone(),
        settings: StreamSettings::from_config(&config.pipeline),
        use_cache: config.pipeline.use_cache,
        shutdown: shutdown.clone(),
    });

    for name in manager.camera_names() {
        info!("Camera endpoint ready: http://localhost:{}/{}", config.server.port, name);
    }

    let addr = (config.server.bind_address.as_str(), config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {}:{}", addr.0, addr.1))?;

    info!(
        "MJPEG server listening on {} (serve FPS: {}, fetch FPS: {}, cache: {})",
        listener.local_addr()?,
        config.pipeline.serve_fps,
        config.pipeline.fetch_fps,
        if config.pipeline.use_cache { "enabled" } else { "disabled" }
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    while let Some(res) = fetchers.join_next().await {
        if let Err(e) = res {
            error!("Fetcher task failed: {}", e);
        }
    }

    manager.log_stats();
    info!("snapstream shutting down");
    Ok(())
}

/// Resolves on Ctrl-C, after cancelling every fetcher and stream
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => {
                error!("Failed to listen for Ctrl-C: {}", e);
                shutdown.cancelled().await;
            }
        },
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
