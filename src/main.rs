//! EventKV - An Event-Driven In-Memory Key-Value Server
//!
//! This is the main entry point for the EventKV server.
//! It reads the configuration, installs logging and runs the server until
//! Ctrl+C is received.

use anyhow::Context;
use clap::Parser;
use eventkv::config::Config;
use eventkv::server::Server;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config, address: std::net::SocketAddr) {
    println!(
        r#"
EventKV v{} - Event-Driven In-Memory Key-Value Server
──────────────────────────────────────────────────────────────
Server started on {}
Sweep interval: {} ms
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        eventkv::VERSION,
        address,
        config.sweep_interval_ms,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and environment
    let config = Config::parse();

    // Set up logging; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let server = Server::bind(&config)
        .await
        .with_context(|| format!("failed to start server on {}", config.bind_address()))?
        .start();

    print_banner(&config, server.local_addr());

    // Wait for the shutdown signal
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C, shutting down");
    }
    info!("Shutdown signal received, stopping server...");

    let stats = server.shutdown().await?;
    info!(
        handled = stats.handled,
        failed = stats.failed,
        dropped = stats.dropped,
        "Server shutdown complete"
    );
    Ok(())
}
