//! Tick arithmetic for request lead times.
//!
//! The `+ 1`/`- 1` guard ticks compensate for tick-granularity boundaries:
//! a request issued *within* tick `t` is only guaranteed to have taken
//! effect once tick `t + latency` has fully elapsed.

use eventdev_time::Tick;

/// Latest tick by which a state request must already have been issued for
/// the device to be ready by `start_tick`.
pub(crate) fn activation_deadline(start_tick: Tick, request_latency: Tick) -> Tick {
    start_tick - request_latency - 1
}

/// Earliest tick the device is guaranteed ready if a request were issued at
/// `now`.
pub(crate) fn earliest_effect(now: Tick, request_latency: Tick) -> Tick {
    now + request_latency + 1
}

/// Whether a reservation starting at `start_tick` can no longer be satisfied
/// by a request issued in the future, and so must be counted into the state
/// required right now.
pub(crate) fn is_due(start_tick: Tick, now: Tick, request_latency: Tick) -> bool {
    activation_deadline(start_tick, request_latency) <= earliest_effect(now, request_latency)
}

/// Tick at which a request issued at `issued_at` is guaranteed to have taken
/// effect.
pub(crate) fn settle_tick(issued_at: Tick, request_latency: Tick) -> Tick {
    issued_at + request_latency + 1
}
