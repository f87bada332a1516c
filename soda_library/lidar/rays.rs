//! Lidar ray layout and configuration

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use soda_core::error::{SodaError, SodaResult};

/// How a ray's depth is read from the depth texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// Closest texel
    Nearest,
    /// Weighted mean of the 4 surrounding texels
    Bilinear,
    /// Smallest of the 4 surrounding texels
    #[default]
    Min,
}

/// Lidar emulated from a rendered depth texture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidarDepthConfig {
    /// Vertical layers
    pub channels: u32,
    /// Rays per layer
    pub step: u32,
    /// Degrees
    pub fov_horizontal: f32,
    /// Degrees
    pub fov_vertical_min: f32,
    /// Degrees
    pub fov_vertical_max: f32,
    pub texture_width: u32,
    pub texture_height: u32,
    /// Horizontal FOV of the depth camera (degrees)
    pub camera_fov: f32,
    /// Metres represented by a unit depth sample
    pub depth_map_norm: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub interpolation: Interpolation,
    /// Probability of dropping a valid return
    pub precipitation: f32,
    pub seed: u64,
}

impl Default for LidarDepthConfig {
    fn default() -> Self {
        Self {
            channels: 64,
            step: 250,
            fov_horizontal: 64.0,
            fov_vertical_min: -15.0,
            fov_vertical_max: 15.0,
            texture_width: 1920,
            texture_height: 1208,
            camera_fov: 65.0,
            depth_map_norm: 200.0,
            range_min: 0.5,
            range_max: 200.0,
            interpolation: Interpolation::default(),
            precipitation: 0.0,
            seed: 0,
        }
    }
}

impl LidarDepthConfig {
    pub fn with_layout(mut self, channels: u32, step: u32) -> Self {
        self.channels = channels;
        self.step = step;
        self
    }

    pub fn with_fov(mut self, horizontal: f32, vertical_min: f32, vertical_max: f32) -> Self {
        self.fov_horizontal = horizontal;
        self.fov_vertical_min = vertical_min;
        self.fov_vertical_max = vertical_max;
        self
    }

    pub fn with_texture(mut self, width: u32, height: u32, camera_fov: f32) -> Self {
        self.texture_width = width;
        self.texture_height = height;
        self.camera_fov = camera_fov;
        self
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range_min = min;
        self.range_max = max;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_precipitation(mut self, probability: f32, seed: u64) -> Self {
        self.precipitation = probability;
        self.seed = seed;
        self
    }

    pub fn rays_num(&self) -> usize {
        self.channels as usize * self.step as usize
    }

    pub fn validate(&self, sensor: &str) -> SodaResult<()> {
        if self.rays_num() == 0 {
            return Err(SodaError::EmptyRaySet(sensor.to_string()));
        }
        if self.texture_width == 0 || self.texture_height == 0 {
            return Err(SodaError::activation(
                sensor,
                format!(
                    "depth texture {}x{} is empty",
                    self.texture_width, self.texture_height
                ),
            ));
        }
        if !(self.camera_fov > 0.0 && self.camera_fov < 180.0) {
            return Err(SodaError::activation(
                sensor,
                format!("camera FOV {} outside (0, 180)", self.camera_fov),
            ));
        }
        if !(self.depth_map_norm > 0.0) || !(self.range_min <= self.range_max) {
            return Err(SodaError::activation(
                sensor,
                format!(
                    "depth norm {} / range [{}, {}] invalid",
                    self.depth_map_norm, self.range_min, self.range_max
                ),
            ));
        }
        Ok(())
    }

    /// Unit ray directions, layer-major (`step * layer + column`)
    pub fn rays(&self) -> Vec<Vector3<f32>> {
        let step = self.step as usize;
        let channels = self.channels as usize;
        let mut rays = Vec::with_capacity(step * channels);
        for v in 0..channels {
            let e = (self.fov_vertical_min
                + (self.fov_vertical_max - self.fov_vertical_min) * fraction(v, channels))
            .to_radians();
            for u in 0..step {
                let a = (-self.fov_horizontal / 2.0 + self.fov_horizontal * fraction(u, step))
                    .to_radians();
                rays.push(Vector3::new(e.cos() * a.cos(), e.cos() * a.sin(), e.sin()));
            }
        }
        rays
    }
}

/// `i / (n - 1)`, 0 for a single sample
fn fraction(i: usize, n: usize) -> f32 {
    if n > 1 {
        i as f32 / (n - 1) as f32
    } else {
        0.0
    }
}

/// Stretch a unit ray so that a planar depth sample along it lands on the ray.
///
/// Returns `None` for rays lying in the image plane.
pub fn scale_for_planar_depth(ray: &Vector3<f32>) -> Option<Vector3<f32>> {
    let coef = (1.0 - ray.y * ray.y).sqrt() * (1.0 - ray.z * ray.z).sqrt();
    if coef > f32::EPSILON {
        Some(ray / coef)
    } else {
        None
    }
}
