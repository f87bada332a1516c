//! Simulation clock abstraction
//!
//! Sensors stamp headers and compute tracking deltas from a [`Clock`]
//! injected through their context instead of reading wall time directly.

use parking_lot::Mutex;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Source of simulation timestamps
pub trait Clock: Send + Sync + Debug {
    /// Time elapsed since the start of the simulation
    fn now(&self) -> Duration;
}

/// Wall clock measured from construction
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
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
        self.start.elapsed()
    }
}

/// Manually advanced clock for deterministic tests and lock-step simulation
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move time forward by `delta`
    pub fn advance(&self, delta: Duration) {
        *self.now.lock() += delta;
    }

    pub fn set(&self, now: Duration) {
        *self.now.lock() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}
