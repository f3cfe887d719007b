//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    dump_handler, get_handler, handle_panic, health_handler, load_handler, remove_handler,
    set_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /cache?key=` - Retrieve a value by key
/// - `POST|PUT /cache` - Store a key-value pair (form: key, value, ttl)
/// - `DELETE /cache?key=` - Remove a key, returning its value
/// - `POST /cache/dump` - Save the cache to a file (form: filename)
/// - `POST /cache/load` - Replace the cache from a file (form: filename)
/// - `GET /stats` - Get cache statistics
/// - `GET /health` - Health check endpoint
///
/// Any other method on these paths is answered with 405.
///
/// # Middleware
/// - Panics: converted into 500 responses
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/cache",
            get(get_handler)
                .post(set_handler)
                .put(set_handler)
                .delete(remove_handler),
        )
        .route("/cache/dump", post(dump_handler))
        .route("/cache/load", post(load_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
