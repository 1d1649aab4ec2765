use std::sync::{Mutex, MutexGuard};

use eventdev_time::{Tick, TickSource};
use tracing::trace;

use crate::reservations::{Reservation, ReservationId, ReservationSet};
use crate::timing;

/// Static description of one managed device.
#[derive(Debug, Clone, Copy)]
pub struct EventDeviceConfig {
    /// Number of ordered capability states. States are numbered
    /// `0..state_count`; state `0` is the idle/lowest-cost state.
    pub state_count: u32,
    /// Ticks guaranteed to elapse between issuing a state request and the
    /// device actually being in that state.
    pub request_latency: Tick,
}

/// Side-effecting hook that asks the underlying driver to move to a state.
///
/// Called with the device lock held, possibly from the deferred-callback
/// context: implementations must not block and must not call back into the
/// scheduler that invoked them.
pub trait StateRequester: Send {
    fn request_state(&mut self, state: u32);
}

/// `StateRequester` that ignores every request.
pub struct NoopRequester;

impl StateRequester for NoopRequester {
    fn request_state(&mut self, _state: u32) {}
}

/// Handle to the deferred-callback primitive the scheduler re-arms itself
/// on.
///
/// `arm` replaces any pending arming for this handle; `cancel` is safe to
/// call whether or not the handle is armed. Whoever owns the backing timer
/// must call [`EventDevice::handle_alarm`] once the deadline is reached;
/// both methods are invoked with the device lock held and must not call
/// back into the scheduler.
pub trait DeferredCall: Send {
    fn arm(&mut self, deadline: Tick);
    fn cancel(&mut self);
}

/// `DeferredCall` with no backing timer, for harnesses that poll
/// [`EventDevice::handle_alarm`] themselves.
pub struct NoAlarm;

impl DeferredCall for NoAlarm {
    fn arm(&mut self, _deadline: Tick) {}
    fn cancel(&mut self) {}
}

/// The mutable half of a device: everything the lock protects.
struct Runtime<R, A> {
    reservations: ReservationSet,
    /// State most recently handed to the requester.
    requested_state: u32,
    /// Tick of that request; `None` until the first reservation-driven
    /// request is issued.
    request_issued_at: Option<Tick>,
    requester: R,
    alarm: A,
}

impl<R: StateRequester, A: DeferredCall> Runtime<R, A> {
    /// Tick from which a caller may rely on `desired_state` being in
    /// effect, given the current runtime state.
    ///
    /// Evaluated against the state *before* the accompanying reconcile runs;
    /// afterwards `requested_state` would already reflect the new demand.
    fn effective_tick(
        &self,
        desired_state: u32,
        start_tick: Tick,
        now: Tick,
        latency: Tick,
    ) -> Tick {
        if desired_state <= self.requested_state {
            return start_tick.max(now);
        }
        match self.request_issued_at {
            // A transition is still settling; the new request waits it out
            // and then needs a full latency window of its own.
            Some(issued_at) if issued_at + latency >= now => {
                start_tick.max(timing::settle_tick(issued_at, latency) + latency + 1)
            }
            _ => start_tick.max(timing::earliest_effect(now, latency)),
        }
    }

    /// Recomputes the required state and re-arms the wakeup alarm.
    ///
    /// Idempotent for a fixed reservation set and `now`: a second run issues
    /// no further request and re-arms the same deadline.
    fn reconcile(&mut self, now: Tick, latency: Tick) {
        let mut required = 0u32;
        let mut next_deadline: Option<Tick> = None;

        for reservation in self.reservations.iter() {
            if timing::is_due(reservation.start_tick, now, latency) {
                required = required.max(reservation.desired_state);
            } else {
                // Not due yet; wake up when it would force a re-evaluation.
                let wake = timing::activation_deadline(reservation.start_tick, latency);
                next_deadline = Some(next_deadline.map_or(wake, |d| d.min(wake)));
            }
        }

        if required != self.requested_state {
            match self.request_issued_at {
                // The previous request has not settled; issuing another now
                // would overlap transitions. Retry once it has taken effect.
                Some(issued_at) if issued_at + latency >= now => {
                    let retry = timing::settle_tick(issued_at, latency);
                    next_deadline = Some(next_deadline.map_or(retry, |d| d.min(retry)));
                }
                _ => {
                    trace!(tick = now, state = required, "requesting device state");
                    self.requester.request_state(required);
                    self.requested_state = required;
                    self.request_issued_at = Some(now);
                }
            }
        }

        match next_deadline {
            Some(deadline) => {
                trace!(deadline, "arming reevaluation alarm");
                self.alarm.arm(deadline);
            }
            None => self.alarm.cancel(),
        }
    }
}

/// Reservation scheduler for one shared device.
///
/// All operations take `&self` and are safe to call concurrently from
/// ordinary threads and from the deferred-callback context; a single
/// internal lock totally orders them. The lock is held for the whole of
/// each operation, including the nested [`StateRequester::request_state`]
/// and [`DeferredCall`] side effects.
pub struct EventDevice<C, R, A> {
    config: EventDeviceConfig,
    clock: C,
    runtime: Mutex<Runtime<R, A>>,
}

impl<C: TickSource, R: StateRequester, A: DeferredCall> EventDevice<C, R, A> {
    /// Creates the scheduler and drops the hardware to the idle state.
    ///
    /// No reservations can exist yet, so this bypasses reconciliation. The
    /// initial request is not recorded as an outstanding transition: the
    /// first reservation may issue its request immediately.
    ///
    /// # Panics
    ///
    /// Panics if `state_count` is zero or `request_latency` is negative.
    pub fn new(config: EventDeviceConfig, clock: C, mut requester: R, alarm: A) -> Self {
        assert!(config.state_count > 0, "device needs at least the idle state");
        assert!(config.request_latency >= 0, "request latency cannot be negative");

        requester.request_state(0);
        Self {
            config,
            clock,
            runtime: Mutex::new(Runtime {
                reservations: ReservationSet::new(),
                requested_state: 0,
                request_issued_at: None,
                requester,
                alarm,
            }),
        }
    }

    pub fn config(&self) -> EventDeviceConfig {
        self.config
    }

    /// Reserves at least `desired_state` from `start_tick` onward.
    ///
    /// Returns the reservation handle and the tick from which the caller
    /// may rely on the device actually being at or above `desired_state`.
    /// An out-of-range `desired_state` is clamped to the highest state; a
    /// `start_tick` in the past is immediately due.
    pub fn schedule(&self, desired_state: u32, start_tick: Tick) -> (ReservationId, Tick) {
        let desired_state = self.clamp(desired_state);
        let now = self.clock.now();
        let latency = self.config.request_latency;

        let mut runtime = self.runtime();
        let effective = runtime.effective_tick(desired_state, start_tick, now, latency);
        let id = runtime.reservations.insert(Reservation {
            desired_state,
            start_tick,
        });
        runtime.reconcile(now, latency);
        (id, effective)
    }

    /// Changes an existing reservation in place, preserving its identity.
    ///
    /// Same return contract as [`schedule`](Self::schedule). Never
    /// allocates a new slot, so external bookkeeping keyed on `id` stays
    /// valid.
    ///
    /// # Panics
    ///
    /// Panics if `id` was already released or belongs to another device.
    pub fn reschedule(&self, id: ReservationId, desired_state: u32, start_tick: Tick) -> Tick {
        let desired_state = self.clamp(desired_state);
        let now = self.clock.now();
        let latency = self.config.request_latency;

        let mut runtime = self.runtime();
        let reservation = runtime
            .reservations
            .get_mut(id)
            .expect("reschedule of a released or foreign reservation");
        reservation.desired_state = desired_state;
        reservation.start_tick = start_tick;

        let effective = runtime.effective_tick(desired_state, start_tick, now, latency);
        runtime.reconcile(now, latency);
        effective
    }

    /// [`schedule`](Self::schedule) with `start_tick` = now: the caller
    /// wants the state as soon as the device can deliver it.
    pub fn request(&self, desired_state: u32) -> (ReservationId, Tick) {
        self.schedule(desired_state, self.clock.now())
    }

    /// [`reschedule`](Self::reschedule) with `start_tick` = now.
    pub fn rerequest(&self, id: ReservationId, desired_state: u32) -> Tick {
        self.reschedule(id, desired_state, self.clock.now())
    }

    /// Drops a reservation. May downgrade the device; the downgrade request
    /// (if any) is issued before this returns.
    ///
    /// # Panics
    ///
    /// Panics if `id` was already released or belongs to another device.
    pub fn release(&self, id: ReservationId) {
        let now = self.clock.now();
        let mut runtime = self.runtime();
        runtime
            .reservations
            .remove(id)
            .expect("release of an unknown reservation");
        runtime.reconcile(now, self.config.request_latency);
    }

    /// Deferred-callback reentry point: re-evaluates against the current
    /// tick. Spurious calls are harmless.
    pub fn handle_alarm(&self) {
        let now = self.clock.now();
        self.runtime().reconcile(now, self.config.request_latency);
    }

    /// State most recently requested from the driver.
    pub fn requested_state(&self) -> u32 {
        self.runtime().requested_state
    }

    /// Number of live reservations.
    pub fn reservation_count(&self) -> usize {
        self.runtime().reservations.len()
    }

    fn clamp(&self, desired_state: u32) -> u32 {
        desired_state.min(self.config.state_count - 1)
    }

    fn runtime(&self) -> MutexGuard<'_, Runtime<R, A>> {
        self.runtime.lock().expect("event device lock poisoned")
    }
}
