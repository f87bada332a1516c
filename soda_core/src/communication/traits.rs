//! Transport-facing traits
//!
//! The pipeline never talks to a network socket itself. A finished reading
//! is handed to a [`Publisher`], and whatever sits behind it (ZMQ, UDP, a
//! recorder, a test collector) is somebody else's concern.

use crate::error::SodaResult;
use std::fmt::Debug;

/// Sink for finished sensor readings
pub trait Publisher<T>: Send + Sync + Debug {
    /// Send a message - returns Ok on success, Err on failure
    fn send(&self, msg: T) -> SodaResult<()>;

    /// Send and report success as a flag
    fn try_send(&self, msg: T) -> bool {
        self.send(msg).is_ok()
    }

    /// Human-readable endpoint name for logs
    fn endpoint(&self) -> &str {
        "publisher"
    }
}

/// Compact one-line rendering used when logging published readings
pub trait LogSummary {
    fn log_summary(&self) -> String;
}

impl LogSummary for f32 {
    fn log_summary(&self) -> String {
        format!("{:.3}", self)
    }
}

impl LogSummary for f64 {
    fn log_summary(&self) -> String {
        format!("{:.3}", self)
    }
}

impl LogSummary for String {
    fn log_summary(&self) -> String {
        self.clone()
    }
}
