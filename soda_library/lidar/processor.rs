//! Lidar from a depth texture

use super::projector::{sample_depth, ProjectionMap, SampledRayProjector};
use super::rays::{scale_for_planar_depth, LidarDepthConfig};
use crate::camera::SensorFrame;
use crate::messages::{LidarPoint, LidarPointStatus, LidarScan};
use crate::publish::SensorPublishAdapter;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use soda_core::error::{SodaError, SodaResult};
use soda_core::scheduling::SensorProcessor;

pub struct LidarDepthProcessor {
    name: String,
    config: LidarDepthConfig,
    /// Rays stretched for planar depth, `None` where that is impossible
    rays: Vec<Option<Vector3<f32>>>,
    map: ProjectionMap,
    depth: Vec<f32>,
    rng: StdRng,
    publisher: SensorPublishAdapter,
    invalid_frames: u64,
}

impl LidarDepthProcessor {
    /// Sensor with the ray layout generated from `config`
    pub fn new(name: &str, config: LidarDepthConfig, publisher: SensorPublishAdapter) -> SodaResult<Self> {
        config.validate(name)?;
        let rays = config.rays();
        Self::with_rays(name, config, rays, publisher)
    }

    /// Sensor with an explicit ray set, one unit ray per `(channel, step)` slot
    pub fn with_rays(
        name: &str,
        config: LidarDepthConfig,
        rays: Vec<Vector3<f32>>,
        publisher: SensorPublishAdapter,
    ) -> SodaResult<Self> {
        config.validate(name)?;
        if rays.is_empty() {
            return Err(SodaError::EmptyRaySet(name.to_string()));
        }
        if rays.len() != config.rays_num() {
            return Err(SodaError::activation(
                name,
                format!(
                    "{} rays for a {}x{} layout",
                    rays.len(),
                    config.channels,
                    config.step
                ),
            ));
        }

        let projector = SampledRayProjector::new(
            config.camera_fov,
            config.texture_width,
            config.texture_height,
        )
        .map_err(|e| SodaError::activation(name, e.to_string()))?;
        let rays: Vec<Option<Vector3<f32>>> = rays.iter().map(scale_for_planar_depth).collect();
        let projected: Vec<Vector3<f32>> = rays
            .iter()
            .map(|r| r.unwrap_or_else(|| -Vector3::x()))
            .collect();
        let map = projector.build_projection_map(&projected);

        let skipped = map.out_of_texture(config.interpolation);
        if skipped > 0 {
            tracing::warn!(
                "[{}] {} of {} rays fall outside the depth texture FOV",
                name,
                skipped,
                map.len()
            );
        }

        Ok(Self {
            name: name.to_string(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            rays,
            map,
            depth: Vec::new(),
            publisher,
            invalid_frames: 0,
        })
    }

    pub fn config(&self) -> &LidarDepthConfig {
        &self.config
    }

    pub fn projection_map(&self) -> &ProjectionMap {
        &self.map
    }

    pub fn invalid_frames(&self) -> u64 {
        self.invalid_frames
    }

    /// Sample every ray from a captured depth frame
    pub fn scan(&mut self, frame: &SensorFrame) -> SodaResult<LidarScan> {
        if frame.width != self.config.texture_width || frame.height != self.config.texture_height {
            return Err(SodaError::InvalidFrame(format!(
                "depth frame is {}x{}, texture is {}x{}",
                frame.width, frame.height, self.config.texture_width, self.config.texture_height
            )));
        }
        frame.decode_depth_map(&mut self.depth)?;

        let config = &self.config;
        let step = config.step.max(1) as usize;
        let mut points = Vec::with_capacity(self.rays.len());
        for (k, ray) in self.rays.iter().enumerate() {
            let sample = ray.and_then(|r| {
                sample_depth(&self.map, &self.depth, k, config.interpolation).map(|d| (r, d))
            });
            let mut point = LidarPoint {
                layer: (k / step) as u32,
                ..Default::default()
            };
            if let Some((ray, depth)) = sample {
                let location = ray * depth * config.depth_map_norm;
                point.position = Point3::from(location);
                point.depth = location.norm();
                if depth < 1.0 && point.depth >= config.range_min && point.depth <= config.range_max {
                    point.status = if config.precipitation > 0.0
                        && self.rng.gen::<f32>() < config.precipitation
                    {
                        LidarPointStatus::Filtered
                    } else {
                        LidarPointStatus::Valid
                    };
                }
            }
            points.push(point);
        }

        Ok(LidarScan {
            header: frame.header.clone(),
            fov_horizontal: config.fov_horizontal,
            fov_vertical_min: config.fov_vertical_min,
            fov_vertical_max: config.fov_vertical_max,
            range_min: config.range_min,
            range_max: config.range_max,
            channels: config.channels,
            step: config.step,
            points,
        })
    }
}

impl SensorProcessor for LidarDepthProcessor {
    type Frame = SensorFrame;

    fn process(&mut self, frame: &mut SensorFrame) {
        match self.scan(frame) {
            Ok(scan) => {
                self.publisher.publish(scan);
            }
            Err(e) => {
                self.invalid_frames += 1;
                if self.invalid_frames == 1 {
                    tracing::warn!("[{}] dropping depth frame: {}", self.name, e);
                }
            }
        }
    }

    fn on_finish(&mut self) {
        if self.invalid_frames > 0 {
            tracing::warn!("[{}] {} depth frames were unusable", self.name, self.invalid_frames);
        }
    }
}
