//! Scheduler Module
//!
//! Per-key expiry timers that fire removal callbacks after a TTL elapses.
//!
//! # Components
//! - `ExpiryScheduler`: spawns and tracks timer tasks, drains them on shutdown
//! - `TimerHandle`: cancels one scheduled expiry

mod expiry;
mod timer;

pub use expiry::{ExpiryScheduler, ShutdownSummary};
pub use timer::TimerHandle;
