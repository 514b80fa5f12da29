//! Monotonic millisecond clocks.
//!
//! The core never reads wall time directly. Everything goes through a
//! [`Clock`], so a replay or a test can drive the scheduler with exact,
//! reproducible timestamps.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// A monotonic time source in milliseconds with sub-millisecond resolution.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Real clock backed by [`Instant`], measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-driven clock. Clones share the same reading, so the host keeps one
/// handle and gives another to the core.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(ms)),
        }
    }

    /// Move the clock forward by `ms`.
    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    /// Jump to an absolute reading. Going backwards is allowed so callers can
    /// exercise the invariant checks.
    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}
