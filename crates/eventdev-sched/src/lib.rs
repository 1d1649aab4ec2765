#![forbid(unsafe_code)]

//! Latency-compensated state reservation scheduling for shared devices.
//!
//! # Design
//!
//! A managed device occupies one of an ordered set of capability states;
//! state `0` is idle. Moving between states is not instantaneous: a request
//! takes a fixed number of ticks to take effect. Independent callers place
//! [reservations](EventDevice::schedule) demanding a minimum state from a
//! given tick onward, and the scheduler keeps exactly one request
//! outstanding toward the driver: the maximum state demanded by any
//! reservation that is currently *due* (too close in time to be satisfied
//! by a request issued later).
//!
//! The scheduler is lazy: instead of polling, it arms a single deferred
//! callback ([`DeferredCall`]) for the next tick at which its decision can
//! change, and re-evaluates when that callback fires. All work runs
//! synchronously on the calling context under one lock per device; nothing
//! here blocks or suspends.

mod device;
mod reservations;
mod timing;

pub use device::{
    DeferredCall, EventDevice, EventDeviceConfig, NoAlarm, NoopRequester, StateRequester,
};
pub use eventdev_time::{Tick, TickSource};
pub use reservations::ReservationId;
