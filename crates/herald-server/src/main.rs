//! # Herald
//!
//! Publish/subscribe broker speaking JSON-RPC over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! herald
//!
//! # Run with custom config
//! herald --config /path/to/herald.toml
//!
//! # Run with environment variables
//! HERALD_PORT=9091 HERALD_HOST=0.0.0.0 herald
//! ```

mod admin;
mod config;
mod metrics;
mod notifier;
mod server;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Herald publish/subscribe broker.
#[derive(Debug, Parser)]
#[command(name = "herald", version, about)]
struct Args {
    /// Path to a TOML config file.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald=debug,herald_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::load(args.config.as_deref())?;

    tracing::info!("Starting Herald broker on {}:{}", config.host, config.port);

    metrics::init_metrics();

    server::run_server(config).await?;

    Ok(())
}
