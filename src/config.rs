//! Configuration Module
//!
//! Handles loading server configuration from environment variables, with
//! command-line flags taking precedence.

use std::env;
use std::time::Duration;

use clap::Parser;

use crate::error::{CacheError, Result};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the HTTP server binds to
    pub host: String,
    /// HTTP server port
    pub server_port: u16,
    /// Default TTL in milliseconds for entries without explicit TTL
    pub default_ttl_ms: u64,
    /// How long shutdown waits for running expiry callbacks, in milliseconds
    pub shutdown_grace_ms: u64,
    /// Number of runtime worker threads handling requests and timers
    pub worker_threads: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `HOST` - Bind address (default: 127.0.0.1)
    /// - `SERVER_PORT` - HTTP server port (default: 8080)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 5000)
    /// - `SHUTDOWN_GRACE_MS` - Shutdown grace period in milliseconds (default: 5000)
    /// - `WORKER_THREADS` - Runtime worker threads (default: 10)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port),
            default_ttl_ms: parse_or(&lookup, "DEFAULT_TTL_MS", defaults.default_ttl_ms),
            shutdown_grace_ms: parse_or(&lookup, "SHUTDOWN_GRACE_MS", defaults.shutdown_grace_ms),
            worker_threads: parse_or(&lookup, "WORKER_THREADS", defaults.worker_threads),
        }
    }

    /// Applies command-line flags on top of this configuration.
    pub fn with_args(mut self, args: &CliArgs) -> Self {
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server_port = port;
        }
        if let Some(ttl) = args.ttl {
            self.default_ttl_ms = ttl;
        }
        if let Some(grace) = args.grace {
            self.shutdown_grace_ms = grace;
        }
        if let Some(workers) = args.workers {
            self.worker_threads = workers;
        }
        self
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_ms == 0 {
            return Err(CacheError::InvalidRequest(
                "Default TTL must be a positive number of milliseconds".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(CacheError::InvalidRequest(
                "At least one worker thread is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            server_port: 8080,
            default_ttl_ms: 5000,
            shutdown_grace_ms: 5000,
            worker_threads: 10,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Command-line flags. Each one overrides its environment variable.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "ttl_cache", version, about = "In-memory TTL cache server")]
pub struct CliArgs {
    /// Address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Default entry TTL in milliseconds
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Shutdown grace period in milliseconds
    #[arg(long)]
    pub grace: Option<u64>,

    /// Number of runtime worker threads
    #[arg(long)]
    pub workers: Option<usize>,
}
