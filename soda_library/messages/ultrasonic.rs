use crate::ultrasonic::UltrasonicEcho;
use serde::{Deserialize, Serialize};
use soda_core::communication::LogSummary;
use soda_core::core::SensorHeader;

/// Echoes received by one ultrasonic sensor, nearest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UltrasonicEchoSet {
    pub sensor: String,
    /// True for the sensor that transmitted this tick
    pub is_transmitter: bool,
    pub echoes: Vec<UltrasonicEcho>,
}

/// One tick of an ultrasonic hub: an echo set per physical sensor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UltrasonicHubScan {
    pub header: SensorHeader,
    /// Index of the transmitting sensor
    pub transmitter: usize,
    pub sensors: Vec<UltrasonicEchoSet>,
}

impl LogSummary for UltrasonicHubScan {
    fn log_summary(&self) -> String {
        let echoes: usize = self.sensors.iter().map(|s| s.echoes.len()).sum();
        format!(
            "UltrasonicHubScan[{}#{}] tx={} sensors={} echoes={}",
            self.header.sensor,
            self.header.frame_index,
            self.transmitter,
            self.sensors.len(),
            echoes
        )
    }
}
