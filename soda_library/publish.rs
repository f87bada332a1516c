//! Boundary between processors and the external transport

use crate::messages::SensorReading;
use soda_core::communication::{LogSummary, Publisher};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Forwards finished readings to a [`Publisher`] and keeps delivery counters.
///
/// A failed send is logged at debug level and counted; it never reaches the
/// worker that produced the reading.
#[derive(Clone)]
pub struct SensorPublishAdapter {
    publisher: Arc<dyn Publisher<SensorReading>>,
    published: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl SensorPublishAdapter {
    pub fn new(publisher: Arc<dyn Publisher<SensorReading>>) -> Self {
        Self {
            publisher,
            published: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Hand a reading to the transport, returning whether it was accepted
    pub fn publish(&self, reading: impl Into<SensorReading>) -> bool {
        let reading = reading.into();
        let summary = if tracing::enabled!(tracing::Level::TRACE) {
            Some(reading.log_summary())
        } else {
            None
        };
        match self.publisher.send(reading) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                if let Some(summary) = summary {
                    tracing::trace!("{} <- {}", self.publisher.endpoint(), summary);
                }
                true
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Publish to {} failed: {}", self.publisher.endpoint(), e);
                false
            }
        }
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn endpoint(&self) -> &str {
        self.publisher.endpoint()
    }
}

impl fmt::Debug for SensorPublishAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorPublishAdapter")
            .field("endpoint", &self.publisher.endpoint())
            .field("published", &self.published())
            .field("failed", &self.failed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::RadarScan;
    use soda_core::communication::{ChannelPublisher, NullPublisher};

    #[test]
    fn test_counts_and_delivery() {
        let (tx, rx) = ChannelPublisher::<SensorReading>::bounded("test", 1);
        let adapter = SensorPublishAdapter::new(Arc::new(tx));

        assert!(adapter.publish(RadarScan::default()));
        // channel full
        assert!(!adapter.publish(RadarScan::default()));
        assert_eq!(adapter.published(), 1);
        assert_eq!(adapter.failed(), 1);

        let got = rx.try_recv().unwrap();
        assert_eq!(got.kind(), "radar");
    }

    #[test]
    fn test_clones_share_counters() {
        let adapter = SensorPublishAdapter::new(Arc::new(NullPublisher));
        let other = adapter.clone();
        other.publish(RadarScan::default());
        assert_eq!(adapter.published(), 1);
    }
}
