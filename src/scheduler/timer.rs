//! Timer Handle Module
//!
//! A handle to one scheduled expiry. Firing and cancelling race on a single
//! atomic state word, so exactly one of them wins.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use super::expiry::TimerSet;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

// == Timer State ==
/// Shared state word between a timer task and its handle.
#[derive(Debug, Default)]
pub(crate) struct TimerState(AtomicU8);

impl TimerState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(PENDING)))
    }

    /// Claims the right to run the action. False if the timer was cancelled.
    pub(crate) fn try_fire(&self) -> bool {
        self.transition(FIRED)
    }

    /// Claims the right to prevent the action. False if it already fired.
    pub(crate) fn try_cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire) == PENDING
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.0.load(Ordering::Acquire) == FIRED
    }

    fn transition(&self, to: u8) -> bool {
        self.0
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

// == Timer Handle ==
/// Back-reference to a pending expiry owned by a cache entry.
///
/// Dropping the handle does not cancel the timer; call [`TimerHandle::cancel`].
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    state: Arc<TimerState>,
    timers: Weak<TimerSet>,
}

impl TimerHandle {
    pub(crate) fn new(id: u64, state: Arc<TimerState>, timers: Weak<TimerSet>) -> Self {
        Self { id, state, timers }
    }

    /// Scheduler-unique timer id.
    pub fn id(&self) -> u64 {
        self.id
    }

    // == Cancel ==
    /// Cancels the timer if it has not fired yet.
    ///
    /// Returns `true` if this call stopped the action from running. Cancelling
    /// a timer that already fired or was already cancelled returns `false`.
    pub fn cancel(&self) -> bool {
        if !self.state.try_cancel() {
            return false;
        }

        if let Some(timers) = self.timers.upgrade() {
            timers.abort(self.id);
        }
        true
    }

    /// True while neither fired nor cancelled.
    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// True once the action has been claimed by the timer task.
    pub fn has_fired(&self) -> bool {
        self.state.is_fired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_then_cancel() {
        let state = TimerState::new();
        assert!(state.is_pending());
        assert!(state.try_fire());
        assert!(!state.try_cancel());
        assert!(state.is_fired());
    }

    #[test]
    fn test_cancel_then_fire() {
        let state = TimerState::new();
        assert!(state.try_cancel());
        assert!(!state.try_fire());
        assert!(!state.is_pending());
        assert!(!state.is_fired());
    }

    #[test]
    fn test_handle_cancel_is_idempotent() {
        let handle = TimerHandle::new(7, TimerState::new(), Weak::new());

        assert_eq!(handle.id(), 7);
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(!handle.is_pending());
    }
}
