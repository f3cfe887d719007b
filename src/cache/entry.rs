//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and their expiry timer.

use tokio::time::{Duration, Instant};

use crate::scheduler::TimerHandle;

// == Cache Entry ==
/// A stored value together with the timer that will expire it.
///
/// The generation identifies this particular write of the key: an expiry
/// callback only removes the key while the entry it was scheduled for is
/// still the one in the store.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    generation: u64,
    expires_at: Instant,
    expiry: TimerHandle,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry expiring `ttl` from now.
    pub fn new(value: V, generation: u64, ttl: Duration, expiry: TimerHandle) -> Self {
        Self {
            value,
            generation,
            expires_at: Instant::now() + ttl,
            expiry,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // == Is Expired ==
    /// Checks if the deadline has passed.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to its deadline, whether or not the timer has run.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining time before expiry, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    /// The timer that will expire this entry.
    pub fn expiry(&self) -> &TimerHandle {
        &self.expiry
    }

    /// Cancels the expiry timer. Returns false if it already fired.
    pub fn cancel_expiry(&self) -> bool {
        self.expiry.cancel()
    }
}
