use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::Tick;

/// A monotonic tick counter.
///
/// `now` must be non-decreasing and must return consistent values from every
/// context that can reach a scheduler built on top of it, including the
/// context that runs deferred timer callbacks.
pub trait TickSource: Send + Sync {
    fn now(&self) -> Tick;
}

/// Shared, manually advanced clock for tests and host harnesses.
///
/// Clones observe the same underlying counter, so a harness can hand one
/// clone to a device model and keep another to drive time forward.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock whose current time is `now`.
    pub fn at(now: Tick) -> Self {
        let clock = Self::default();
        clock.set_now(now);
        clock
    }

    /// Advances the clock by `ticks`.
    ///
    /// # Panics
    ///
    /// Panics if `ticks` is negative; the clock is monotonic.
    pub fn advance(&self, ticks: i64) {
        assert!(ticks >= 0, "ManualClock::advance would move time backwards");
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }

    /// Sets the current tick, intended for save/restore.
    ///
    /// This may move time backwards; callers must restore any dependent
    /// timer state to a matching snapshot.
    pub fn set_now(&self, now: Tick) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl TickSource for ManualClock {
    fn now(&self) -> Tick {
        self.now.load(Ordering::SeqCst)
    }
}
