//! Client Module
//!
//! A thin HTTP client for a running cache server. Each method maps to one
//! endpoint and decodes the JSON body the server returns.

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{
    ErrorResponse, KeyQuery, LookupResponse, SetRequest, SnapshotRequest, SnapshotResponse,
    StatsResponse,
};

/// Errors returned by [`CacheClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the body could not be decoded
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// HTTP client for the cache server.
#[derive(Debug, Clone)]
pub struct CacheClient {
    http: Client,
    base_url: String,
}

impl CacheClient {
    /// Creates a client for the server at `base_url`, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a client that reuses an existing reqwest client.
    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Looks up `key`. An absent key is `Ok(None)`.
    pub async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let response = self
            .http
            .get(self.url("/cache"))
            .query(&key_query(key))
            .send()
            .await?;

        let body: LookupResponse = decode(response).await?;
        Ok(body.value)
    }

    /// Stores `value` under `key`.
    ///
    /// `ttl_ms` is only sent when positive; otherwise the server's default TTL applies.
    pub async fn set(&self, key: &str, value: &str, ttl_ms: Option<u64>) -> ClientResult<()> {
        let form = SetRequest {
            key: Some(key.to_string()),
            value: Some(value.to_string()),
            ttl: ttl_ms.filter(|ttl| *ttl > 0).map(|ttl| ttl.to_string()),
        };

        let response = self.http.post(self.url("/cache")).form(&form).send().await?;
        check(response).await?;
        Ok(())
    }

    /// Removes `key`, returning the value it held.
    pub async fn remove(&self, key: &str) -> ClientResult<Option<String>> {
        let response = self
            .http
            .delete(self.url("/cache"))
            .query(&key_query(key))
            .send()
            .await?;

        let body: LookupResponse = decode(response).await?;
        Ok(body.value)
    }

    /// Asks the server to write its contents to `filename`. Returns the entry count.
    pub async fn dump(&self, filename: &str) -> ClientResult<usize> {
        self.snapshot("/cache/dump", filename).await
    }

    /// Asks the server to replace its contents with `filename`. Returns the entry count.
    pub async fn load(&self, filename: &str) -> ClientResult<usize> {
        self.snapshot("/cache/load", filename).await
    }

    pub async fn stats(&self) -> ClientResult<StatsResponse> {
        let response = self.http.get(self.url("/stats")).send().await?;
        decode(response).await
    }

    async fn snapshot(&self, path: &str, filename: &str) -> ClientResult<usize> {
        let form = SnapshotRequest {
            filename: Some(filename.to_string()),
        };

        let response = self.http.post(self.url(path)).form(&form).send().await?;
        let body: SnapshotResponse = decode(response).await?;
        Ok(body.entries)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn key_query(key: &str) -> KeyQuery {
    KeyQuery {
        key: Some(key.to_string()),
    }
}

/// Turns a non-success status into [`ClientError::Server`].
async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.error)
        .unwrap_or(text);

    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let response = check(response).await?;
    Ok(response.json::<T>().await?)
}
