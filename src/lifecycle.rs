//! Lifecycle Module
//!
//! Startup and shutdown sequencing: the HTTP server stops accepting
//! requests first, then the store's expiry scheduler is drained.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::cache::CacheStore;
use crate::config::Config;

/// Binds the configured address and serves until Ctrl+C or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    serve(listener, &config, shutdown_signal()).await
}

/// Serves the cache on `listener` until `signal` resolves.
///
/// # Sequence
/// 1. Create the cache store and its expiry scheduler
/// 2. Serve requests until the signal fires, letting in-flight requests finish
/// 3. Shut the scheduler down within the configured grace period
pub async fn serve<F>(listener: TcpListener, config: &Config, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    let state = AppState::from_config(config);
    let cache = state.cache.clone();
    info!(
        default_ttl_ms = config.default_ttl_ms,
        "Cache store initialized"
    );

    let app = create_router(state);
    info!("Server listening on http://{}", addr);

    let server = async move { axum::serve(listener, app).with_graceful_shutdown(signal).await };
    run_until_stopped(&cache, config.shutdown_grace(), server).await
}

/// Drives `server` to completion, then drains the store's expiry timers
/// whether the server stopped cleanly or failed.
async fn run_until_stopped<F>(cache: &CacheStore, grace: Duration, server: F) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let served = server.await.context("HTTP server failed");
    if let Err(err) = &served {
        tracing::error!(error = %err, "HTTP server stopped with an error");
    }

    info!(entries = cache.len(), "HTTP server stopped, draining expiry timers");
    let summary = cache.shutdown(grace).await;

    info!(
        cancelled = summary.cancelled,
        drained = summary.drained,
        forced = summary.forced,
        "Server shutdown complete"
    );
    served
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_run_fails_when_port_is_taken() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = Config {
            server_port: taken.local_addr().unwrap().port(),
            ..Config::default()
        };

        let err = run(config).await.unwrap_err();
        assert!(err.to_string().contains("failed to bind"));
    }

    #[tokio::test]
    async fn test_serve_returns_after_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = Config {
            shutdown_grace_ms: 100,
            ..Config::default()
        };
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            serve(listener, &config, async {
                let _ = stopped.await;
            })
            .await
        });

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failed_server_still_drains_timers() {
        let cache = CacheStore::new(Duration::from_secs(60));
        cache.set("k".to_string(), "v".to_string(), None).unwrap();

        let failing = async {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "accept loop died",
            ))
        };
        let err = run_until_stopped(&cache, Duration::from_millis(100), failing)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("HTTP server failed"));
        assert_eq!(cache.pending_timers(), 0);
        assert!(matches!(
            cache.set("other".to_string(), "v".to_string(), None),
            Err(crate::error::CacheError::ShutDown)
        ));
    }
}
