//! polykv - In-Memory Key-Value Store
//!
//! Main entry point: parses configuration, builds the shared keyspace and
//! starts the RESP listener plus the HTTP and WebSocket gateways.

use anyhow::Context;
use clap::Parser;
use polykv::config::{Cli, ServerConfig};
use polykv::connection::{accept_loop, ConnectionStats};
use polykv::gateway;
use polykv::storage::{ExpiryConfig, ExpirySweeper, StorageEngine};
use polykv::CommandHandler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &ServerConfig) {
    let filter = match &config.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn print_banner(config: &ServerConfig) {
    println!(
        r#"
polykv v{} - In-Memory Key-Value Store
──────────────────────────────────────────────────────────────
RESP       {}
HTTP       {}
WebSocket  {}

Use Ctrl+C to shutdown gracefully.
"#,
        polykv::VERSION,
        config.resp_address(),
        config.http_address().as_deref().unwrap_or("disabled"),
        config.ws_address().as_deref().unwrap_or("disabled"),
    );
}

async fn bind(address: &str, what: &str) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {} listener on {}", what, address))?;
    info!(address = %address, "{} listening", what);
    Ok(listener)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from(Cli::parse());

    init_tracing(&config);
    print_banner(&config);

    // The keyspace is shared by every front-end
    let storage = Arc::new(StorageEngine::new());
    let handler = CommandHandler::new(Arc::clone(&storage));
    info!(shards = storage.shard_count(), "Storage engine initialized");

    let _sweeper = ExpirySweeper::start(
        Arc::clone(&storage),
        ExpiryConfig::with_base_interval(config.sweep_interval),
    );

    let mut servers = JoinSet::new();

    let resp_listener = bind(&config.resp_address(), "RESP").await?;
    let stats = Arc::new(ConnectionStats::new());
    let resp_handler = handler.clone();
    servers.spawn(async move {
        accept_loop(resp_listener, resp_handler, stats).await;
        Ok::<_, std::io::Error>(())
    });

    if let Some(address) = config.http_address() {
        let listener = bind(&address, "HTTP").await?;
        servers.spawn(gateway::http::serve(listener, handler.clone()));
    }

    if let Some(address) = config.ws_address() {
        let listener = bind(&address, "WebSocket").await?;
        servers.spawn(gateway::websocket::serve(listener, handler.clone()));
    }

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Shutdown signal received, stopping server...");
        }
        Some(result) = servers.join_next() => {
            match result {
                Ok(Ok(())) => info!("A listener stopped"),
                Ok(Err(e)) => error!(error = %e, "A listener failed"),
                Err(e) => error!(error = %e, "A listener task panicked"),
            }
        }
    }

    servers.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}
