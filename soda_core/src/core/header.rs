use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stamp attached to every frame and reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorHeader {
    /// Name of the producing sensor
    pub sensor: String,
    /// Monotonic per-sensor counter of submitted frames
    pub frame_index: u64,
    /// Simulation time at capture
    pub timestamp: Duration,
}

impl SensorHeader {
    pub fn new(sensor: impl Into<String>, frame_index: u64, timestamp: Duration) -> Self {
        Self {
            sensor: sensor.into(),
            frame_index,
            timestamp,
        }
    }

    /// Timestamp in seconds
    pub fn stamp_secs(&self) -> f64 {
        self.timestamp.as_secs_f64()
    }
}
