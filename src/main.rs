//! TTL Cache - an in-memory key-value cache server
//!
//! Every entry expires after its TTL; the cache can be dumped to and loaded
//! from a snapshot file on demand.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_cache::config::CliArgs;
use ttl_cache::{lifecycle, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables and flags
/// 3. Build a runtime with the configured number of workers
/// 4. Serve until SIGINT/SIGTERM, then drain expiry timers
fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env().with_args(&args);
    config.validate()?;

    info!(
        "Configuration loaded: host={}, port={}, default_ttl={}ms, grace={}ms, workers={}",
        config.host,
        config.server_port,
        config.default_ttl_ms,
        config.shutdown_grace_ms,
        config.worker_threads
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name("ttl-cache-worker")
        .enable_all()
        .build()?;

    runtime.block_on(lifecycle::run(config))
}
