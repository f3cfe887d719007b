//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies. They also
//! deserialize, for use by the client.

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;

/// Message carried by a lookup of an absent key
pub const ABSENT_MESSAGE: &str = "Value not found";

/// Response body for GET and DELETE on `/cache`
///
/// An absent key is a successful lookup with `value: null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    /// The requested key
    pub key: String,
    /// The stored (or removed) value
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LookupResponse {
    pub fn found(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            message: None,
        }
    }

    pub fn absent(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            message: Some(ABSENT_MESSAGE.to_string()),
        }
    }

    /// Builds a found or absent response from a lookup result.
    pub fn from_lookup(key: impl Into<String>, value: Option<String>) -> Self {
        match value {
            Some(value) => Self::found(key, value),
            None => Self::absent(key),
        }
    }
}

/// Response body for the SET operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for `POST /cache/dump` and `POST /cache/load`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    /// Success message
    pub message: String,
    /// Snapshot file the operation used
    pub filename: String,
    /// Number of entries written or loaded
    pub entries: usize,
}

impl SnapshotResponse {
    pub fn dumped(filename: impl Into<String>, entries: usize) -> Self {
        Self {
            message: "State saved successfully".to_string(),
            filename: filename.into(),
            entries,
        }
    }

    pub fn loaded(filename: impl Into<String>, entries: usize) -> Self {
        Self {
            message: "State loaded successfully".to_string(),
            filename: filename.into(),
            entries,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of writes
    pub sets: u64,
    /// Number of caller removals
    pub removals: u64,
    /// Number of timer expirations
    pub expirations: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            sets: stats.sets,
            removals: stats.removals,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
