//! In-process publishers

use super::traits::Publisher;
use crate::error::{SodaError, SodaResult};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::fmt;

/// Publisher backed by a crossbeam channel.
///
/// Bounded channels never block the worker: a full channel is reported
/// as a send failure and the reading is dropped.
#[derive(Clone)]
pub struct ChannelPublisher<T> {
    name: String,
    tx: Sender<T>,
}

impl<T> ChannelPublisher<T> {
    /// Create a bounded publisher and the matching receiver
    pub fn bounded(name: &str, capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = channel::bounded(capacity.max(1));
        (
            Self {
                name: name.to_string(),
                tx,
            },
            rx,
        )
    }

    /// Create an unbounded publisher and the matching receiver
    pub fn unbounded(name: &str) -> (Self, Receiver<T>) {
        let (tx, rx) = channel::unbounded();
        (
            Self {
                name: name.to_string(),
                tx,
            },
            rx,
        )
    }
}

impl<T> fmt::Debug for ChannelPublisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelPublisher")
            .field("name", &self.name)
            .field("queued", &self.tx.len())
            .finish()
    }
}

impl<T: Send> Publisher<T> for ChannelPublisher<T> {
    fn send(&self, msg: T) -> SodaResult<()> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SodaError::Publish(format!("{}: channel full", self.name)),
            TrySendError::Disconnected(_) => {
                SodaError::Publish(format!("{}: receiver dropped", self.name))
            }
        })
    }

    fn endpoint(&self) -> &str {
        &self.name
    }
}

/// Publisher that discards everything
#[derive(Debug, Clone, Default)]
pub struct NullPublisher;

impl<T> Publisher<T> for NullPublisher {
    fn send(&self, _msg: T) -> SodaResult<()> {
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "null"
    }
}
