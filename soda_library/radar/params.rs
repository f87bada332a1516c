//! Radar band parameters and reflectivity table

use crate::scene::{ObjectCategory, RaySegment};
use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use soda_core::error::{SodaError, SodaResult};

/// Default scan period (s)
pub const DEFAULT_RADAR_PERIOD: f32 = 0.07;

/// RCS multiplier applied to hits in object mode
pub const DEFAULT_OBJECT_MODE_RCS_MULTIPLIER: f32 = 6.0;

/// One radar band (near, far, ...) with its coverage envelope.
///
/// Angles are in degrees, distances in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarParams {
    pub tag: String,
    pub enabled: bool,
    /// Half-width of the horizontal FOV
    pub fov_horizont_max: f32,
    /// Half-width of the region covered at full distance
    pub fov_horizont_full_dist: f32,
    pub fov_vertical: f32,
    pub distance_min: f32,
    pub distance_max: f32,
    /// Reach at the FOV edge
    pub distance_on_max_angle: f32,
    /// Resolution at boresight
    pub horizontal_best_resolution: f32,
    /// Resolution at `fov_horizont_full_dist`
    pub horizontal_resolution_full_dist_angle: f32,
    /// Resolution at `fov_horizont_max`
    pub horizontal_resolution_max_angle: f32,
    /// Hits weaker than this RCS are not detected
    pub min_signal_coef: f32,
}

impl Default for RadarParams {
    fn default() -> Self {
        Self {
            tag: String::new(),
            enabled: true,
            fov_horizont_max: 60.0,
            fov_horizont_full_dist: 45.0,
            fov_vertical: 20.0,
            distance_min: 0.2,
            distance_max: 70.0,
            distance_on_max_angle: 40.0,
            horizontal_best_resolution: 1.0,
            horizontal_resolution_full_dist_angle: 4.5,
            horizontal_resolution_max_angle: 12.3,
            min_signal_coef: 0.002,
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

impl RadarParams {
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn with_fov(mut self, horizont_max: f32, horizont_full_dist: f32, vertical: f32) -> Self {
        self.fov_horizont_max = horizont_max;
        self.fov_horizont_full_dist = horizont_full_dist;
        self.fov_vertical = vertical;
        self
    }

    pub fn with_distances(mut self, min: f32, max: f32, on_max_angle: f32) -> Self {
        self.distance_min = min;
        self.distance_max = max;
        self.distance_on_max_angle = on_max_angle;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Three-band layout of the general-purpose radar: nearest, near, far
    pub fn general_bands() -> Vec<RadarParams> {
        vec![
            RadarParams::default()
                .with_tag("Nearest")
                .with_fov(60.0, 40.0, 20.0)
                .with_distances(0.2, 70.0 * 0.18, 40.0),
            RadarParams::default()
                .with_tag("Near")
                .with_fov(60.0, 40.0, 20.0)
                .with_distances(70.0 * 0.18, 70.0, 40.0),
            RadarParams::default()
                .with_tag("Far")
                .with_fov(9.0, 4.0, 20.0)
                .with_distances(1.0, 250.0, 150.0),
        ]
    }

    pub fn validate(&self) -> SodaResult<()> {
        if !(self.horizontal_best_resolution > 0.0) {
            return Err(SodaError::Config(format!(
                "radar band '{}': best resolution must be positive",
                self.tag
            )));
        }
        if !(self.fov_horizont_max > 0.0)
            || !(self.fov_horizont_full_dist > 0.0)
            || self.fov_horizont_full_dist > self.fov_horizont_max
        {
            return Err(SodaError::Config(format!(
                "radar band '{}': expected 0 < full-distance FOV <= max FOV, got {} / {}",
                self.tag, self.fov_horizont_full_dist, self.fov_horizont_max
            )));
        }
        if !(self.distance_max > self.distance_min) || self.distance_min < 0.0 {
            return Err(SodaError::Config(format!(
                "radar band '{}': invalid distance range [{}, {}]",
                self.tag, self.distance_min, self.distance_max
            )));
        }
        Ok(())
    }

    pub fn beams_num(&self) -> usize {
        (2.0 * self.fov_horizont_max / self.horizontal_best_resolution) as usize
    }

    /// Angular resolution at `angle`, linear from boresight to the FOV edge
    pub fn get_resolution_for_angle(&self, angle: f32) -> f32 {
        let angle = angle.abs();
        if angle < self.fov_horizont_full_dist {
            lerp(
                self.horizontal_best_resolution,
                self.horizontal_resolution_full_dist_angle,
                angle / self.fov_horizont_full_dist,
            )
        } else {
            lerp(
                self.horizontal_resolution_full_dist_angle,
                self.horizontal_resolution_max_angle,
                (angle - self.fov_horizont_full_dist)
                    / (self.fov_horizont_max - self.fov_horizont_full_dist),
            )
        }
    }

    /// Traced length of the beam at `angle`, measured from `distance_min`
    pub fn get_ray_length(&self, angle: f32) -> f32 {
        let angle = angle.abs();
        let mut dist = self.distance_max;
        if angle > self.fov_horizont_full_dist {
            dist = lerp(
                dist,
                self.distance_on_max_angle,
                (angle - self.fov_horizont_full_dist)
                    / (self.fov_horizont_max - self.fov_horizont_full_dist),
            );
        }
        dist - self.distance_min
    }

    /// Beam footprint width at maximum distance
    pub fn beam_width(&self) -> f32 {
        2.0 * self.distance_max * (self.horizontal_best_resolution / 2.0).to_radians().atan()
    }

    /// Beam footprint height at maximum distance
    pub fn beam_height(&self) -> f32 {
        2.0 * self.distance_max * (self.fov_vertical / 2.0).to_radians().atan()
    }

    /// Enumerate the sweep beams of this band in sensor space
    pub fn beams(&self) -> Vec<RadarBeam> {
        let n = self.beams_num();
        if n == 0 {
            return Vec::new();
        }
        let step = 2.0 * self.fov_horizont_max / n as f32;
        let radius = self.beam_width() / 2.0;
        let start = (self.distance_min - radius).max(0.0);
        (0..n)
            .map(|i| {
                let azimuth = -self.fov_horizont_max + step * i as f32;
                let a = azimuth.to_radians();
                RadarBeam {
                    azimuth,
                    direction: Vector3::new(a.cos(), a.sin(), 0.0),
                    start_distance: start,
                    length: self.get_ray_length(azimuth),
                    width: self.beam_width(),
                    height: self.beam_height(),
                }
            })
            .collect()
    }
}

/// One swept beam of a radar band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarBeam {
    /// Degrees, positive to the left
    pub azimuth: f32,
    /// Unit direction in sensor space
    pub direction: Vector3<f32>,
    pub start_distance: f32,
    pub length: f32,
    pub width: f32,
    pub height: f32,
}

impl RadarBeam {
    /// World-space segment for a sensor at `pose`
    pub fn segment(&self, pose: &Isometry3<f32>) -> RaySegment {
        let dir = pose.rotation * self.direction;
        let origin = Point3::from(pose.translation.vector);
        RaySegment {
            start: origin + dir * self.start_distance,
            end: origin + dir * (self.start_distance + self.length),
        }
    }

}

/// Radar cross-section per object category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarRcsTable {
    pub buildings: f32,
    pub fences: f32,
    pub pedestrians: f32,
    pub poles: f32,
    pub traffic_signs: f32,
    pub vegetation: f32,
    pub vehicles: f32,
    pub walls: f32,
}

impl Default for RadarRcsTable {
    fn default() -> Self {
        Self {
            buildings: 0.005,
            fences: 0.2,
            pedestrians: 1.0,
            poles: 0.4,
            traffic_signs: 0.5,
            vegetation: 0.1,
            vehicles: 3.0,
            walls: 0.05,
        }
    }
}

impl RadarRcsTable {
    pub fn rcs_for(&self, category: ObjectCategory) -> f32 {
        match category {
            ObjectCategory::Buildings => self.buildings,
            ObjectCategory::Fences => self.fences,
            ObjectCategory::Pedestrians => self.pedestrians,
            ObjectCategory::Poles => self.poles,
            ObjectCategory::TrafficSigns => self.traffic_signs,
            ObjectCategory::Vegetation => self.vegetation,
            ObjectCategory::Vehicles => self.vehicles,
            ObjectCategory::Walls => self.walls,
        }
    }

    /// True when the category blocks radio waves
    pub fn is_blocking(category: ObjectCategory) -> bool {
        matches!(
            category,
            ObjectCategory::Buildings
                | ObjectCategory::TrafficSigns
                | ObjectCategory::Vehicles
                | ObjectCategory::Walls
        )
    }
}
