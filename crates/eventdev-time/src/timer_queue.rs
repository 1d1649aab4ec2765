use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::Tick;

/// Opaque handle to a scheduled timer.
///
/// Ids are allocated from a monotonically increasing counter and never
/// reused, so a stale handle can at worst name a timer that no longer
/// exists; it can never alias a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// The timer was never scheduled, already fired, or was canceled.
    #[error("unknown timer id {0:?}")]
    UnknownTimer(TimerId),
}

/// An expired timer, as returned by [`TimerQueue::pop_expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent<T> {
    pub id: TimerId,
    pub deadline: Tick,
    pub token: T,
}

/// Deadline-ordered one-shot timer queue.
///
/// Entries carry a caller-supplied token instead of a callback; the driving
/// loop pops expired entries and dispatches them itself. Ties on the same
/// deadline fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    // Keyed by (deadline, id) so iteration order is firing order.
    by_deadline: BTreeMap<(Tick, u64), T>,
    deadlines: HashMap<u64, Tick>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            by_deadline: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Schedules `token` to expire at the absolute tick `deadline`.
    ///
    /// A deadline at or before the current time is valid; the entry simply
    /// expires on the next [`pop_expired`](Self::pop_expired) pass.
    pub fn schedule(&mut self, deadline: Tick, token: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.by_deadline.insert((deadline, id), token);
        self.deadlines.insert(id, deadline);
        TimerId(id)
    }

    /// Cancels a pending timer, returning its token.
    ///
    /// Returns `None` if the timer already fired or was already canceled;
    /// canceling is always safe.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let deadline = self.deadlines.remove(&id.0)?;
        self.by_deadline.remove(&(deadline, id.0))
    }

    /// Moves a pending timer to a new absolute deadline, keeping its token
    /// and id.
    pub fn reschedule(&mut self, id: TimerId, deadline: Tick) -> Result<(), TimerError> {
        let old = *self
            .deadlines
            .get(&id.0)
            .ok_or(TimerError::UnknownTimer(id))?;
        if old == deadline {
            return Ok(());
        }
        let token = self
            .by_deadline
            .remove(&(old, id.0))
            .ok_or(TimerError::UnknownTimer(id))?;
        self.by_deadline.insert((deadline, id.0), token);
        self.deadlines.insert(id.0, deadline);
        Ok(())
    }

    /// The earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Tick> {
        self.by_deadline.keys().next().map(|&(deadline, _)| deadline)
    }

    /// Removes and returns the next timer whose deadline is at or before
    /// `now`, or `None` once no pending timer has expired.
    pub fn pop_expired(&mut self, now: Tick) -> Option<TimerEvent<T>> {
        let &(deadline, id) = self.by_deadline.keys().next()?;
        if deadline > now {
            return None;
        }
        let token = self.by_deadline.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some(TimerEvent {
            id: TimerId(id),
            deadline,
            token,
        })
    }

    pub fn len(&self) -> usize {
        self.by_deadline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_deadline.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(30, "late");
        queue.schedule(10, "early");
        queue.schedule(20, "middle");

        assert_eq!(queue.next_deadline(), Some(10));
        assert_eq!(queue.pop_expired(25).map(|e| e.token), Some("early"));
        assert_eq!(queue.pop_expired(25).map(|e| e.token), Some("middle"));
        // The 30-tick entry has not expired yet.
        assert_eq!(queue.pop_expired(25), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn same_deadline_fires_in_scheduling_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(5, 'a');
        queue.schedule(5, 'b');

        assert_eq!(queue.pop_expired(5).map(|e| e.token), Some('a'));
        assert_eq!(queue.pop_expired(5).map(|e| e.token), Some('b'));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(10, ());

        assert_eq!(queue.cancel(id), Some(()));
        assert_eq!(queue.cancel(id), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn canceled_timer_never_fires() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(10, "canceled");
        queue.schedule(10, "kept");
        queue.cancel(id);

        assert_eq!(queue.pop_expired(100).map(|e| e.token), Some("kept"));
        assert_eq!(queue.pop_expired(100), None);
    }

    #[test]
    fn reschedule_moves_the_deadline() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(10, ());
        queue.reschedule(id, 50).unwrap();

        assert_eq!(queue.pop_expired(10), None);
        let event = queue.pop_expired(50).unwrap();
        assert_eq!(event.id, id);
        assert_eq!(event.deadline, 50);
    }

    #[test]
    fn reschedule_after_fire_reports_unknown() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(10, ());
        queue.pop_expired(10).unwrap();

        assert_eq!(queue.reschedule(id, 20), Err(TimerError::UnknownTimer(id)));
    }

    #[test]
    fn ids_are_not_reused() {
        let mut queue = TimerQueue::new();
        let first = queue.schedule(10, ());
        queue.cancel(first);
        let second = queue.schedule(10, ());

        assert_ne!(first, second);
        assert_eq!(queue.cancel(first), None);
        assert_eq!(queue.cancel(second), Some(()));
    }
}
