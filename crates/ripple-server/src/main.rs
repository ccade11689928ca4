//! # Ripple Server
//!
//! Realtime presence and chat fan-out server. Tracks who is online and
//! which chats exist, and pushes events (messages, membership changes,
//! typing, read receipts, presence transitions) to the connections of
//! affected participants only.
//!
//! The binary reads `ripple.toml` from the working directory,
//! `/etc/ripple/`, or `~/.config/ripple/`; without one it falls back to
//! defaults, overridable through `RIPPLE_HOST` and `RIPPLE_PORT`. Log
//! verbosity follows `RUST_LOG` (default `ripple=debug`).

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ripple=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Ripple server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
