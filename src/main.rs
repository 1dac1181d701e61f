//! putter: an HTTP test double
//!
//! This is the server entry point.
//!
//! Current capabilities:
//! - Accepts any request and records method, URI, body size and SHA-256
//! - Bounded newest-first history at any path containing `recordedRequests`
//! - Runtime chaos tuning at any path containing `configDelay`
//! - In-flight request ceiling with 503 rejections
//! - Prometheus counters at `/metrics`
//!
//! Everything is in memory and lost on restart.

use clap::Parser;
use putter::config::{Args, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = ServerConfig::from_args(&args)?;

    // Runs until the process is killed
    putter::server::listener::run(config).await?;

    Ok(())
}
