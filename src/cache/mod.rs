//! Cache Module
//!
//! Provides the in-memory store with per-entry TTL timers.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::{CacheStats, StatsCounters};
pub use store::CacheStore;
