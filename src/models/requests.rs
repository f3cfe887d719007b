//! Request DTOs for the cache server API
//!
//! Defines the query parameters and form bodies of incoming requests. Every
//! field is optional at the wire level so that missing or malformed input is
//! reported as a 400 by `validate` rather than rejected by the extractor.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Query string of `GET /cache` and `DELETE /cache`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyQuery {
    pub key: Option<String>,
}

impl KeyQuery {
    /// Returns the key, or a validation failure if it is missing.
    pub fn require_key(self) -> Result<String> {
        self.key
            .ok_or_else(|| CacheError::InvalidRequest("Missing key".to_string()))
    }
}

/// Form body of the SET operation (`POST /cache` or `PUT /cache`)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: The value to store
/// - `ttl`: Optional TTL in milliseconds; empty means the server default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetRequest {
    pub key: Option<String>,
    pub value: Option<String>,
    pub ttl: Option<String>,
}

/// A validated SET operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCommand {
    pub key: String,
    pub value: String,
    pub ttl: Option<Duration>,
}

impl SetRequest {
    /// Validates the request data and converts it into a [`SetCommand`].
    pub fn validate(self) -> Result<SetCommand> {
        let (Some(key), Some(value)) = (self.key, self.value) else {
            return Err(CacheError::InvalidRequest(
                "Missing key or value".to_string(),
            ));
        };

        let ttl = parse_ttl(self.ttl.as_deref())?;
        Ok(SetCommand { key, value, ttl })
    }
}

/// Parses a TTL field in milliseconds.
///
/// Missing or empty means "use the default". Zero, negative and non-numeric
/// values are rejected.
pub fn parse_ttl(raw: Option<&str>) -> Result<Option<Duration>> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    let millis: u64 = raw
        .parse()
        .map_err(|_| CacheError::InvalidRequest(format!("Invalid TTL format: {raw}")))?;
    if millis == 0 {
        return Err(CacheError::InvalidRequest(
            "TTL must be a positive number of milliseconds".to_string(),
        ));
    }
    Ok(Some(Duration::from_millis(millis)))
}

/// Form body of `POST /cache/dump` and `POST /cache/load`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub filename: Option<String>,
}

impl SnapshotRequest {
    /// Returns the file name, or a validation failure if it is missing.
    pub fn require_filename(self) -> Result<String> {
        match self.filename {
            Some(filename) if !filename.is_empty() => Ok(filename),
            _ => Err(CacheError::InvalidRequest("Missing filename".to_string())),
        }
    }
}
