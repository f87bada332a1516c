//! Readings published by the sensor pipeline
//!
//! Every processor produces exactly one [`SensorReading`] per processed
//! frame and hands it to the [`SensorPublishAdapter`](crate::publish::SensorPublishAdapter).

pub mod camera;
pub mod lidar;
pub mod radar;
pub mod ultrasonic;

pub use camera::CameraImage;
pub use lidar::{LidarPoint, LidarPointStatus, LidarScan};
pub use radar::{RadarDetections, RadarScan};
pub use ultrasonic::{UltrasonicEchoSet, UltrasonicHubScan};

use serde::{Deserialize, Serialize};
use soda_core::communication::LogSummary;
use soda_core::core::SensorHeader;

/// Closed set of sensor outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorReading {
    Camera(CameraImage),
    Lidar(LidarScan),
    Radar(RadarScan),
    Ultrasonic(UltrasonicHubScan),
}

impl SensorReading {
    pub fn header(&self) -> &SensorHeader {
        match self {
            SensorReading::Camera(m) => &m.header,
            SensorReading::Lidar(m) => &m.header,
            SensorReading::Radar(m) => &m.header,
            SensorReading::Ultrasonic(m) => &m.header,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SensorReading::Camera(_) => "camera",
            SensorReading::Lidar(_) => "lidar",
            SensorReading::Radar(_) => "radar",
            SensorReading::Ultrasonic(_) => "ultrasonic",
        }
    }
}

impl LogSummary for SensorReading {
    fn log_summary(&self) -> String {
        match self {
            SensorReading::Camera(m) => m.log_summary(),
            SensorReading::Lidar(m) => m.log_summary(),
            SensorReading::Radar(m) => m.log_summary(),
            SensorReading::Ultrasonic(m) => m.log_summary(),
        }
    }
}

impl From<CameraImage> for SensorReading {
    fn from(m: CameraImage) -> Self {
        SensorReading::Camera(m)
    }
}

impl From<LidarScan> for SensorReading {
    fn from(m: LidarScan) -> Self {
        SensorReading::Lidar(m)
    }
}

impl From<RadarScan> for SensorReading {
    fn from(m: RadarScan) -> Self {
        SensorReading::Radar(m)
    }
}

impl From<UltrasonicHubScan> for SensorReading {
    fn from(m: UltrasonicHubScan) -> Self {
        SensorReading::Ultrasonic(m)
    }
}
