//! Shared harness pieces: a request recorder that timestamps every driver
//! call, and a `DeferredCall` backed by a real `TimerQueue` so tests can run
//! the scheduler's autonomous re-arming loop.

use std::sync::{Arc, Mutex};

use eventdev_sched::{DeferredCall, EventDevice, EventDeviceConfig, StateRequester};
use eventdev_time::{ManualClock, Tick, TickSource, TimerId, TimerQueue};

/// Records every `request_state` call together with the tick it was issued
/// at.
#[derive(Clone)]
pub struct Recorder {
    clock: ManualClock,
    requests: Arc<Mutex<Vec<(Tick, u32)>>>,
}

impl Recorder {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn take(&self) -> Vec<(Tick, u32)> {
        std::mem::take(&mut self.requests.lock().unwrap())
    }

    pub fn all(&self) -> Vec<(Tick, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

impl StateRequester for Recorder {
    fn request_state(&mut self, state: u32) {
        self.requests.lock().unwrap().push((self.clock.now(), state));
    }
}

/// `DeferredCall` that keeps at most one entry live in a shared
/// [`TimerQueue`], replacing it on every re-arm.
pub struct QueueAlarm {
    queue: Arc<Mutex<TimerQueue<()>>>,
    armed: Option<TimerId>,
}

impl QueueAlarm {
    pub fn new(queue: Arc<Mutex<TimerQueue<()>>>) -> Self {
        Self { queue, armed: None }
    }
}

impl DeferredCall for QueueAlarm {
    fn arm(&mut self, deadline: Tick) {
        let mut queue = self.queue.lock().unwrap();
        if let Some(id) = self.armed {
            if queue.reschedule(id, deadline).is_ok() {
                return;
            }
        }
        self.armed = Some(queue.schedule(deadline, ()));
    }

    fn cancel(&mut self) {
        if let Some(id) = self.armed.take() {
            self.queue.lock().unwrap().cancel(id);
        }
    }
}

pub type HarnessDevice = EventDevice<ManualClock, Recorder, QueueAlarm>;

/// A device wired to a manual clock and a timer queue, plus the loop that
/// plays the deferred callback's role.
pub struct Harness {
    pub clock: ManualClock,
    pub recorder: Recorder,
    pub queue: Arc<Mutex<TimerQueue<()>>>,
    pub device: HarnessDevice,
}

impl Harness {
    pub fn new(state_count: u32, request_latency: Tick) -> Self {
        let clock = ManualClock::new();
        let recorder = Recorder::new(clock.clone());
        let queue = Arc::new(Mutex::new(TimerQueue::new()));
        let device = EventDevice::new(
            EventDeviceConfig {
                state_count,
                request_latency,
            },
            clock.clone(),
            recorder.clone(),
            QueueAlarm::new(Arc::clone(&queue)),
        );
        Self {
            clock,
            recorder,
            queue,
            device,
        }
    }

    /// Advances the clock to `target`, firing every expired alarm along the
    /// way in deadline order, each at its own deadline tick.
    pub fn run_until(&self, target: Tick) {
        loop {
            let next = self.queue.lock().unwrap().next_deadline();
            match next {
                Some(deadline) if deadline <= target => {
                    if deadline > self.clock.now() {
                        self.clock.set_now(deadline);
                    }
                    // Pop before dispatch; handle_alarm may re-arm.
                    let fired = self.queue.lock().unwrap().pop_expired(self.clock.now());
                    if fired.is_some() {
                        self.device.handle_alarm();
                    }
                }
                _ => break,
            }
        }
        if self.clock.now() < target {
            self.clock.set_now(target);
        }
    }
}
