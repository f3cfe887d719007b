//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint. Handlers only parse
//! and validate arguments; every cache operation goes straight to the store.

use std::any::Any;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use tracing::warn;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    HealthResponse, KeyQuery, LookupResponse, SetRequest, SetResponse, SnapshotRequest,
    SnapshotResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The store synchronizes internally, so it is shared without an outer lock.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: CacheStore,
}

impl AppState {
    /// Creates a new AppState with the given cache store.
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Must be called from within a tokio runtime; the store's timers run on it.
    pub fn from_config(config: &Config) -> Self {
        Self::new(CacheStore::new(config.default_ttl()))
    }
}

/// Handler for GET /cache?key=...
pub async fn get_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<LookupResponse>> {
    let key = query.require_key()?;
    let value = state.cache.get(&key);

    Ok(Json(LookupResponse::from_lookup(key, value)))
}

/// Handler for POST and PUT /cache
///
/// Form fields: `key`, `value`, optional `ttl` in milliseconds.
pub async fn set_handler(
    State(state): State<AppState>,
    Form(req): Form<SetRequest>,
) -> Result<Json<SetResponse>> {
    let cmd = req.validate()?;
    state.cache.set(cmd.key.clone(), cmd.value, cmd.ttl)?;

    Ok(Json(SetResponse::new(cmd.key)))
}

/// Handler for DELETE /cache?key=...
pub async fn remove_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<LookupResponse>> {
    let key = query.require_key()?;
    let value = state.cache.remove(&key);

    Ok(Json(LookupResponse::from_lookup(key, value)))
}

/// Handler for POST /cache/dump
pub async fn dump_handler(
    State(state): State<AppState>,
    Form(req): Form<SnapshotRequest>,
) -> Result<Json<SnapshotResponse>> {
    let filename = req.require_filename()?;
    let entries = state.cache.dump(&filename).await.map_err(|err| {
        warn!(filename = %filename, error = %err, "Snapshot dump failed");
        err
    })?;

    Ok(Json(SnapshotResponse::dumped(filename, entries)))
}

/// Handler for POST /cache/load
pub async fn load_handler(
    State(state): State<AppState>,
    Form(req): Form<SnapshotRequest>,
) -> Result<Json<SnapshotResponse>> {
    let filename = req.require_filename()?;
    let entries = state.cache.load(&filename).await.map_err(|err| {
        warn!(filename = %filename, error = %err, "Snapshot load failed");
        err
    })?;

    Ok(Json(SnapshotResponse::loaded(filename, entries)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().into())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Turns a panic inside a handler into a 500 response.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else {
        "handler panicked".to_string()
    };

    warn!(detail = %detail, "Request handler panicked");
    CacheError::Internal(detail).into_response()
}
