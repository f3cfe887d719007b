//! TTL Cache - an in-memory key-value cache server
//!
//! Each entry owns a timer that removes it once its TTL elapses. The cache
//! is served over HTTP and can be snapshotted to a file on demand.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod scheduler;
pub mod snapshot;

pub use api::AppState;
pub use cache::CacheStore;
pub use client::CacheClient;
pub use config::Config;
pub use error::{CacheError, Result};
