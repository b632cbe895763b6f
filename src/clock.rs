use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

/// Source of time for every delay the engine waits on.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Blocks until `deadline`. Returns immediately when it has passed.
    fn sleep_until(&self, deadline: Duration);

    fn sleep(&self, duration: Duration) {
        self.sleep_until(self.now() + duration);
    }
}

/// Wall clock. Sleeping blocks the thread.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Virtual clock. Sleeping jumps time forward instantly and records the
/// deadline, so tests can assert on scheduling without waiting.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    sleeps: RefCell<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Deadlines passed to `sleep_until`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Duration) {
        self.sleeps.borrow_mut().push(deadline);
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

/// Single in-flight timer. Arming replaces any pending deadline.
#[derive(Debug, Default)]
pub struct TimerSlot {
    deadline: Option<Duration>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, clock: &dyn Clock, delay: Duration) {
        self.deadline = Some(clock.now() + delay);
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Waits for the pending deadline and disarms the slot. Returns `false`
    /// when nothing was armed.
    pub fn wait(&mut self, clock: &dyn Clock) -> bool {
        match self.deadline.take() {
            Some(deadline) => {
                clock.sleep_until(deadline);
                true
            }
            None => false,
        }
    }
}
