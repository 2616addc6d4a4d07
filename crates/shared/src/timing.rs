//! Deadline-based timer handles.
//!
//! The core never sleeps or spawns. Each debounced or scheduled action owns a
//! small handle holding at most one deadline; the host (browser timers,
//! tests) calls `poll`-style methods with the current time.

use std::cell::Cell;
use std::rc::Rc;

use crate::models::Millis;

pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Wall clock for native targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as Millis)
            .unwrap_or(0)
    }
}

/// Hand-driven clock; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        ManualClock {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: Millis) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

/// One pending trailing-edge deadline. Rescheduling replaces the deadline,
/// so only the last call inside a window fires.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay_ms: Millis,
    deadline: Option<Millis>,
}

impl Debounce {
    pub fn new(delay_ms: Millis) -> Self {
        Debounce {
            delay_ms,
            deadline: None,
        }
    }

    pub fn delay_ms(&self) -> Millis {
        self.delay_ms
    }

    pub fn schedule(&mut self, now: Millis) {
        self.deadline = Some(now + self.delay_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.deadline
    }

    /// True exactly once when the deadline has passed; clears it.
    pub fn take_due(&mut self, now: Millis) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Clear a pending deadline regardless of time, reporting whether one existed.
    pub fn take_pending(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

/// Leading-edge rate limiter.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: Millis,
    last: Option<Millis>,
}

impl Throttle {
    pub fn new(interval_ms: Millis) -> Self {
        Throttle {
            interval_ms,
            last: None,
        }
    }

    /// Whether an event at `now` should go through. Records it when it does.
    pub fn ready(&mut self, now: Millis) -> bool {
        match self.last {
            Some(last) if now < last + self.interval_ms && now >= last => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// Last-request-wins gate. Each `issue` invalidates all earlier tickets, so
/// a late response from a superseded request can be recognized and dropped.
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    current: Rc<Cell<u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        let next = self.current.get() + 1;
        self.current.set(next);
        Ticket(next)
    }

    /// Invalidate every outstanding ticket without issuing a new one.
    pub fn abort(&self) {
        self.current.set(self.current.get() + 1);
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current.get() == ticket.0
    }
}
