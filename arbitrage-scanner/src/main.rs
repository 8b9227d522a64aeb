//! Arbitrage scanner application
//!
//! Connects to every enabled venue, aggregates prices and serves observers
//! until interrupted.

mod config;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use arbitrage_core::{ArbitrageScanner, NetworkDialer};
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 Starting arbitrage scanner");

    let config = AppConfig::load().context("invalid configuration")?;
    info!(
        "📈 Symbols: {}",
        config.symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    );
    info!(
        "🔌 Sources: {}",
        config.sources.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    );

    let dialer = Arc::new(NetworkDialer::new().context("failed to build network dialer")?);
    let scanner = ArbitrageScanner::new(config.scanner_config());

    tokio::select! {
        result = scanner.run(dialer) => result.context("observer endpoint failed")?,
        _ = signal::ctrl_c() => info!("🛑 Interrupted, shutting down"),
    }

    Ok(())
}
