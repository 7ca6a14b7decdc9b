//! GitHub bridge admin service
//!
//! Single binary that:
//! 1. Loads configuration and the per-user token store
//! 2. Registers the `github` bot commands
//! 3. Serves the admin API (command dispatch, OAuth callback, health, metrics)

mod admin;
mod config;
mod error;
mod github_commands;
mod metrics;
mod session;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bot_commands::CommandRouter;
use github_auth::{
    GITHUB_API_URL, GitHubApi, JsonFileStore, KeyValueStore, MemoryStore, TokenStore,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::admin::{AdminState, build_admin_router};
use crate::config::Config;

/// How long in-flight requests may run after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting github-bridge-admin");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let api_url = config
        .github
        .as_ref()
        .map(|g| g.api_url())
        .unwrap_or_else(|| GITHUB_API_URL.to_owned());
    info!(
        listen_addr = %config.admin.listen_addr,
        github = config.github.is_some(),
        oauth = config.github.as_ref().is_some_and(|g| g.oauth.is_some()),
        api_url = %api_url,
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.admin.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let backend = open_backend(config.store.path.as_deref()).await?;
    let token_store = Arc::new(TokenStore::new(backend, GitHubApi::new(http, api_url)));

    let mut commands = CommandRouter::new();
    github_commands::register(&mut commands).context("failed to register commands")?;

    let listen_addr = config.admin.listen_addr;
    let max_connections = config.admin.max_connections;
    let state = AdminState::new(
        Arc::new(config),
        token_store,
        Arc::new(commands),
        prometheus_handle,
    );
    let app = build_admin_router(state, max_connections);

    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    // The drain timer starts at signal receipt, not at server start.
    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Open the configured token backend. Without a path, tokens are kept in
/// memory and lost on restart.
async fn open_backend(path: Option<&Path>) -> Result<Arc<dyn KeyValueStore>> {
    match path {
        Some(path) => {
            let store = JsonFileStore::load(path.to_path_buf())
                .await
                .with_context(|| format!("failed to open token store {}", path.display()))?;
            info!(path = %path.display(), "token store loaded");
            Ok(Arc::new(store))
        }
        None => {
            warn!("no store.path configured, tokens will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
