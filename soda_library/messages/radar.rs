use crate::radar::{RadarCluster, RadarObject};
use serde::{Deserialize, Serialize};
use soda_core::communication::LogSummary;
use soda_core::core::SensorHeader;

/// Detections of one radar scan, by mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RadarDetections {
    Clusters(Vec<RadarCluster>),
    /// Tracked objects, nearest first
    Objects(Vec<RadarObject>),
}

impl Default for RadarDetections {
    fn default() -> Self {
        RadarDetections::Clusters(Vec::new())
    }
}

impl RadarDetections {
    pub fn len(&self) -> usize {
        match self {
            RadarDetections::Clusters(c) => c.len(),
            RadarDetections::Objects(o) => o.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarScan {
    pub header: SensorHeader,
    /// Wrapping scan counter
    pub measurement_counter: u16,
    pub detections: RadarDetections,
}

impl LogSummary for RadarScan {
    fn log_summary(&self) -> String {
        let kind = match self.detections {
            RadarDetections::Clusters(_) => "clusters",
            RadarDetections::Objects(_) => "objects",
        };
        format!(
            "RadarScan[{}#{}] {} {}",
            self.header.sensor,
            self.measurement_counter,
            self.detections.len(),
            kind
        )
    }
}
