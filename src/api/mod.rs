//! API Module
//!
//! HTTP handlers and routing for the cache server.
//!
//! # Endpoints
//! - `GET /cache?key=` - Retrieve a value by key
//! - `POST|PUT /cache` - Store a key-value pair
//! - `DELETE /cache?key=` - Remove a key
//! - `POST /cache/dump` - Save a snapshot
//! - `POST /cache/load` - Restore a snapshot
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
