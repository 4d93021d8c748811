//! Rewrite Proxy - A caching proxy in front of a language-model API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rewrite_proxy::{
    create_router, spawn_cleanup_task, AppState, CacheAdapter, CachePolicy, Config, OpenAiClient,
    PresetCatalog, Relay,
};

/// Main entry point for the proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Connect the cache (best effort) and start the sweep task if in-process
/// 4. Load the preset catalog and build the upstream client
/// 5. Start HTTP server on configured port
/// 6. On SIGINT/SIGTERM, drain, stop the sweep task and close the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rewrite_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rewrite Proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, cache_backend={:?}, rewrite_ttl={}s, transcription_ttl={}s, model={}",
        config.server_port,
        config.cache_backend,
        config.rewrite_ttl,
        config.transcription_ttl,
        config.openai_model
    );

    let cache = CacheAdapter::init(&config).await;
    info!("Response cache: {}", cache.backend());

    let cleanup_handle = cache
        .memory_store()
        .map(|store| spawn_cleanup_task(store, config.cleanup_interval));

    let presets = PresetCatalog::builtin().context("failed to load preset catalog")?;
    info!("Loaded {} presets", presets.len());

    let client = Arc::new(OpenAiClient::from_config(&config).context("failed to build HTTP client")?);
    if !client.has_credential() {
        warn!("OPENAI_API_KEY is not set; upstream calls will fail until it is");
    }

    let relay = Relay::new(
        cache.clone(),
        CachePolicy::from_config(&config),
        Arc::new(presets),
        client.clone(),
        client.clone(),
    );
    let state = AppState::new(relay, client.has_credential(), config.max_upload_bytes);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    cache.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the cleanup task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = cleanup_handle {
        handle.abort();
        warn!("Cleanup task aborted");
    }
}
