use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use soda_core::communication::LogSummary;
use soda_core::core::SensorHeader;

/// Validity of a lidar return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LidarPointStatus {
    /// No usable return for this ray
    #[default]
    Invalid,
    Valid,
    /// A return that was removed by the weather model
    Filtered,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LidarPoint {
    /// Sensor frame (x forward, y left, z up), metres
    pub position: Point3<f32>,
    /// Range, metres
    pub depth: f32,
    /// Channel (vertical layer) index
    pub layer: u32,
    pub status: LidarPointStatus,
}

/// One lidar sweep, points in ray enumeration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LidarScan {
    pub header: SensorHeader,
    pub fov_horizontal: f32,
    pub fov_vertical_min: f32,
    pub fov_vertical_max: f32,
    pub range_min: f32,
    pub range_max: f32,
    /// Number of channels (rows)
    pub channels: u32,
    /// Rays per channel (columns)
    pub step: u32,
    pub points: Vec<LidarPoint>,
}

impl LidarScan {
    pub fn valid_points(&self) -> impl Iterator<Item = &LidarPoint> {
        self.points
            .iter()
            .filter(|p| p.status == LidarPointStatus::Valid)
    }
}

impl LogSummary for LidarScan {
    fn log_summary(&self) -> String {
        format!(
            "LidarScan[{}#{}] {}x{} rays, {} valid",
            self.header.sensor,
            self.header.frame_index,
            self.channels,
            self.step,
            self.valid_points().count()
        )
    }
}
