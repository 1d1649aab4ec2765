#![forbid(unsafe_code)]

//! Deterministic tick-based time primitives for event-device scheduling.
//!
//! # Design
//!
//! This crate provides a [`TickSource`] (monotonic scheduler time) and a
//! [`TimerQueue`] (deadline-ordered one-shot timers driven by that time).
//!
//! The queue uses **event delivery** rather than storing callbacks: callers
//! pop expired entries from [`TimerQueue::pop_expired`] and dispatch them
//! through their own `token -> handler` mapping. This keeps the queue inert
//! and fully inspectable, and leaves lock ordering entirely up to the
//! driving loop.

mod clock;
mod timer_queue;

pub use clock::{ManualClock, TickSource};
pub use timer_queue::{TimerError, TimerEvent, TimerId, TimerQueue};

/// Monotonic scheduler time, in ticks.
///
/// Ticks are signed and assumed not to wrap within the lifetime of a
/// process; arithmetic on deadlines is plain `i64` arithmetic.
pub type Tick = i64;
