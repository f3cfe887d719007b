//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{parse_ttl, KeyQuery, SetCommand, SetRequest, SnapshotRequest};
pub use responses::{
    ErrorResponse, HealthResponse, LookupResponse, SetResponse, SnapshotResponse, StatsResponse,
    ABSENT_MESSAGE,
};
