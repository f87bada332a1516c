//! Ultrasonic hub: round-robin transmitter, every sensor listens

use super::echo::{UltrasonicEchos, DEFAULT_ECHOS_MAX_NUM};
use crate::messages::{UltrasonicEchoSet, UltrasonicHubScan};
use crate::publish::SensorPublishAdapter;
use crate::scene::{HitBatch, RayHit, RaySegment};
use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use soda_core::error::{SodaError, SodaResult};
use soda_core::params::RuntimeParams;
use soda_core::scheduling::SensorProcessor;

/// One physical sensor of a hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrasonicSensorConfig {
    pub name: String,
    /// Vertical ray count
    pub rows: usize,
    /// Horizontal ray count
    pub step: usize,
    /// Degrees
    pub fov_horizontal: f32,
    /// Degrees
    pub fov_vertical: f32,
    pub distance_min: f32,
    pub distance_max: f32,
    /// Pose relative to the hub
    pub mount: Isometry3<f32>,
}

impl Default for UltrasonicSensorConfig {
    fn default() -> Self {
        Self {
            name: "ultrasonic".to_string(),
            rows: 25,
            step: 50,
            fov_horizontal: 120.0,
            fov_vertical: 60.0,
            distance_min: 0.2,
            distance_max: 3.0,
            mount: Isometry3::identity(),
        }
    }
}

impl UltrasonicSensorConfig {
    pub fn new(name: &str, mount: Isometry3<f32>) -> Self {
        Self {
            name: name.to_string(),
            mount,
            ..Default::default()
        }
    }

    pub fn with_fov(mut self, horizontal: f32, vertical: f32) -> Self {
        self.fov_horizontal = horizontal;
        self.fov_vertical = vertical;
        self
    }

    pub fn with_distances(mut self, min: f32, max: f32) -> Self {
        self.distance_min = min;
        self.distance_max = max;
        self
    }

    pub fn with_resolution(mut self, rows: usize, step: usize) -> Self {
        self.rows = rows;
        self.step = step;
        self
    }

    pub fn rays_num(&self) -> usize {
        self.rows * self.step
    }

    pub fn cos_fov_horizontal(&self) -> f32 {
        (self.fov_horizontal.to_radians() / 2.0).cos()
    }

    pub fn cos_fov_vertical(&self) -> f32 {
        (self.fov_vertical.to_radians() / 2.0).cos()
    }

    /// Unit ray directions in the sensor frame, row-major (`step * row + col`)
    pub fn ray_directions(&self) -> Vec<Vector3<f32>> {
        let mut dirs = Vec::with_capacity(self.rays_num());
        for i in 0..self.rows {
            let v = (-self.fov_vertical / 2.0 + self.fov_vertical / self.rows as f32 * i as f32)
                .to_radians();
            for j in 0..self.step {
                let h = (-self.fov_horizontal / 2.0
                    + self.fov_horizontal / self.step as f32 * j as f32)
                    .to_radians();
                dirs.push(Vector3::new(v.cos() * h.cos(), v.cos() * h.sin(), v.sin()));
            }
        }
        dirs
    }

    fn validate(&self) -> Result<(), String> {
        if !(self.fov_horizontal > 0.0 && self.fov_horizontal <= 360.0)
            || !(self.fov_vertical > 0.0 && self.fov_vertical <= 360.0)
        {
            return Err(format!(
                "sensor '{}': FOV {}x{} out of range",
                self.name, self.fov_horizontal, self.fov_vertical
            ));
        }
        if !(self.distance_min >= 0.0 && self.distance_min < self.distance_max) {
            return Err(format!(
                "sensor '{}': distance range [{}, {}] is empty",
                self.name, self.distance_min, self.distance_max
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UltrasonicHubConfig {
    pub sensors: Vec<UltrasonicSensorConfig>,
    /// Minimum echo power a receiver registers
    pub threshold: f32,
    /// Distance gap joining hits into one echo (m)
    pub min_dist_gap: f32,
    pub ground_filter: bool,
    /// Hits this far below the transmitter are ground (m)
    pub distance_to_ground: f32,
    pub echos_max_num: usize,
}

impl Default for UltrasonicHubConfig {
    fn default() -> Self {
        Self {
            sensors: Vec::new(),
            threshold: 0.3,
            min_dist_gap: 0.25,
            ground_filter: false,
            distance_to_ground: 0.25,
            echos_max_num: DEFAULT_ECHOS_MAX_NUM,
        }
    }
}

impl UltrasonicHubConfig {
    pub fn with_sensor(mut self, sensor: UltrasonicSensorConfig) -> Self {
        self.sensors.push(sensor);
        self
    }

    pub fn with_ground_filter(mut self, distance_to_ground: f32) -> Self {
        self.ground_filter = true;
        self.distance_to_ground = distance_to_ground;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Override the per-sensor echo limit from `ultrasonic.echos_max_num`
    pub fn with_params(mut self, params: &RuntimeParams) -> Self {
        self.echos_max_num = params.get_usize("ultrasonic.echos_max_num", self.echos_max_num);
        self
    }

    pub fn validate(&self, hub: &str) -> SodaResult<()> {
        if self.sensors.is_empty() {
            return Err(SodaError::activation(hub, "hub has no sensors"));
        }
        for sensor in &self.sensors {
            sensor
                .validate()
                .map_err(|reason| SodaError::activation(hub, reason))?;
            if sensor.rays_num() == 0 {
                return Err(SodaError::EmptyRaySet(format!("{}/{}", hub, sensor.name)));
            }
        }
        if !(self.min_dist_gap >= 0.0) || self.echos_max_num == 0 {
            return Err(SodaError::activation(
                hub,
                format!(
                    "min_dist_gap {} / echos_max_num {} invalid",
                    self.min_dist_gap, self.echos_max_num
                ),
            ));
        }
        Ok(())
    }

    /// Transmitting sensor for a frame, cycling through the hub
    pub fn transmitter_for_frame(&self, frame_index: u64) -> usize {
        if self.sensors.is_empty() {
            return 0;
        }
        (frame_index % self.sensors.len() as u64) as usize
    }

    /// World sweep segments of `transmitter` for a hub at `hub_pose`.
    ///
    /// Hit `ray_index` values refer to positions in this list.
    pub fn transmitter_rays(&self, hub_pose: &Isometry3<f32>, transmitter: usize) -> Vec<RaySegment> {
        let Some(sensor) = self.sensors.get(transmitter) else {
            return Vec::new();
        };
        let pose = hub_pose * sensor.mount;
        let origin = Point3::from(pose.translation.vector);
        sensor
            .ray_directions()
            .into_iter()
            .map(|d| {
                let dir = pose.rotation * d;
                RaySegment {
                    start: origin + dir * sensor.distance_min,
                    end: origin + dir * sensor.distance_max,
                }
            })
            .collect()
    }
}

/// Hit batch of the transmitter's sweep
#[derive(Debug, Clone, Default)]
pub struct UltrasonicFrame {
    /// `sensor_pose` is the hub's world pose
    pub batch: HitBatch,
    pub transmitter: usize,
}

struct Receiver {
    pose: Isometry3<f32>,
    cos_fov_horizontal: f32,
    cos_fov_vertical: f32,
    echos: UltrasonicEchos,
}

pub struct UltrasonicHubProcessor {
    name: String,
    config: UltrasonicHubConfig,
    receivers: Vec<Receiver>,
    publisher: SensorPublishAdapter,
    bad_transmitter: u64,
}

impl UltrasonicHubProcessor {
    pub fn new(
        name: &str,
        config: UltrasonicHubConfig,
        publisher: SensorPublishAdapter,
    ) -> SodaResult<Self> {
        config.validate(name)?;
        let receivers = config
            .sensors
            .iter()
            .map(|s| Receiver {
                pose: s.mount,
                cos_fov_horizontal: s.cos_fov_horizontal(),
                cos_fov_vertical: s.cos_fov_vertical(),
                echos: UltrasonicEchos::new(),
            })
            .collect();
        tracing::debug!("[{}] ultrasonic hub with {} sensors", name, config.sensors.len());
        Ok(Self {
            name: name.to_string(),
            config,
            receivers,
            publisher,
            bad_transmitter: 0,
        })
    }

    pub fn config(&self) -> &UltrasonicHubConfig {
        &self.config
    }

    /// Frames skipped because their transmitter index was out of range
    pub fn bad_transmitter_frames(&self) -> u64 {
        self.bad_transmitter
    }

    /// Evaluate one sweep against every sensor of the hub
    pub fn scan(&mut self, frame: &UltrasonicFrame) -> SodaResult<UltrasonicHubScan> {
        let tx = frame.transmitter;
        if tx >= self.receivers.len() {
            return Err(SodaError::InvalidFrame(format!(
                "transmitter {} of {} sensors",
                tx,
                self.receivers.len()
            )));
        }

        let hub_pose = frame.batch.sensor_pose;
        for (receiver, sensor) in self.receivers.iter_mut().zip(&self.config.sensors) {
            receiver.pose = hub_pose * sensor.mount;
            receiver.echos.clear();
        }
        let tx_location = Point3::from(self.receivers[tx].pose.translation.vector);

        for (index, hit) in frame.batch.hits.iter().enumerate() {
            if !hit.blocking {
                continue;
            }
            if self.config.ground_filter
                && tx_location.z - hit.position.z > self.config.distance_to_ground
            {
                continue;
            }
            self.add_to_receivers(index, hit, tx, &tx_location);
        }

        let mut sensors = Vec::with_capacity(self.receivers.len());
        for (k, (receiver, sensor)) in self.receivers.iter_mut().zip(&self.config.sensors).enumerate() {
            receiver.echos.remove_excess_echos(self.config.echos_max_num);
            receiver.echos.sort_by_distance();
            sensors.push(UltrasonicEchoSet {
                sensor: sensor.name.clone(),
                is_transmitter: k == tx,
                echoes: receiver.echos.take(),
            });
        }

        Ok(UltrasonicHubScan {
            header: frame.batch.header.clone(),
            transmitter: tx,
            sensors,
        })
    }

    fn add_to_receivers(&mut self, index: usize, hit: &RayHit, tx: usize, tx_location: &Point3<f32>) {
        let to_transmitter = tx_location - hit.position;
        let normal = hit.normal.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);

        for (k, (receiver, sensor)) in self.receivers.iter_mut().zip(&self.config.sensors).enumerate() {
            let local = receiver.pose.inverse_transform_point(&hit.position);
            let hor = local.x.hypot(local.y);
            let vert = local.x.hypot(local.z);
            if hor <= 0.0 || vert <= 0.0 {
                continue;
            }
            if local.x / hor < receiver.cos_fov_horizontal || local.x / vert < receiver.cos_fov_vertical {
                continue;
            }

            let location = Point3::from(receiver.pose.translation.vector);
            let to_receiver = location - hit.position;
            let distance = to_receiver.norm();
            if distance > sensor.distance_max {
                continue;
            }
            let mirror = (to_receiver + to_transmitter) / 2.0;
            let cos = mirror
                .try_normalize(f32::EPSILON)
                .map_or(0.0, |m| normal.dot(&m));
            let power = (cos / distance).powi(2);
            if power < self.config.threshold {
                continue;
            }

            let travelled = if k == tx {
                distance
            } else {
                distance + to_transmitter.norm()
            };
            receiver.echos.add_hit(
                index,
                hit.position,
                travelled,
                power,
                self.config.min_dist_gap,
            );
        }
    }
}

impl SensorProcessor for UltrasonicHubProcessor {
    type Frame = UltrasonicFrame;

    fn process(&mut self, frame: &mut UltrasonicFrame) {
        match self.scan(frame) {
            Ok(scan) => {
                self.publisher.publish(scan);
            }
            Err(e) => {
                self.bad_transmitter += 1;
                if self.bad_transmitter == 1 {
                    tracing::warn!("[{}] frame skipped: {}", self.name, e);
                }
            }
        }
    }

    fn on_finish(&mut self) {
        if self.bad_transmitter > 0 {
            tracing::warn!(
                "[{}] {} frames named an unknown transmitter",
                self.name,
                self.bad_transmitter
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use soda_core::communication::NullPublisher;
    use soda_core::core::SensorHeader;
    use std::sync::Arc;

    fn sensor_at(name: &str, y: f32) -> UltrasonicSensorConfig {
        UltrasonicSensorConfig::new(name, Isometry3::translation(0.0, y, 0.0))
    }

    fn hub(config: UltrasonicHubConfig) -> UltrasonicHubProcessor {
        UltrasonicHubProcessor::new("hub", config, SensorPublishAdapter::new(Arc::new(NullPublisher)))
            .unwrap()
    }

    fn wall_hit(ray: usize, x: f32, y: f32, z: f32) -> RayHit {
        RayHit::new(ray, Point3::new(x, y, z), -Vector3::x())
    }

    fn frame(transmitter: usize, hits: Vec<RayHit>) -> UltrasonicFrame {
        UltrasonicFrame {
            batch: HitBatch {
                header: SensorHeader::new("hub", 0, Default::default()),
                hits,
                ..Default::default()
            },
            transmitter,
        }
    }

    #[test]
    fn test_defaults() {
        let s = UltrasonicSensorConfig::default();
        assert_eq!(s.rays_num(), 25 * 50);
        assert_relative_eq!(s.cos_fov_horizontal(), 0.5, epsilon = 1e-6);
        let h = UltrasonicHubConfig::default();
        assert_relative_eq!(h.threshold, 0.3);
        assert!(!h.ground_filter);
    }

    #[test]
    fn test_ray_layout() {
        let config = UltrasonicHubConfig::default()
            .with_sensor(UltrasonicSensorConfig::default().with_resolution(2, 4));
        let rays = config.transmitter_rays(&Isometry3::identity(), 0);
        assert_eq!(rays.len(), 8);
        // row 1, column 2 points straight ahead
        let forward = rays[4 + 2];
        assert_relative_eq!(forward.start, Point3::new(0.2, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(forward.end, Point3::new(3.0, 0.0, 0.0), epsilon = 1e-5);
        assert!(config.transmitter_rays(&Isometry3::identity(), 3).is_empty());
    }

    #[test]
    fn test_round_robin() {
        let config = UltrasonicHubConfig::default()
            .with_sensor(sensor_at("a", 0.2))
            .with_sensor(sensor_at("b", -0.2))
            .with_sensor(sensor_at("c", -0.6));
        let order: Vec<usize> = (0..5).map(|i| config.transmitter_for_frame(i)).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_cross_sensor_echo() {
        let mut hub = hub(
            UltrasonicHubConfig::default()
                .with_sensor(sensor_at("left", 0.2))
                .with_sensor(sensor_at("right", -0.2)),
        );
        let scan = hub.scan(&frame(0, vec![wall_hit(0, 1.0, 0.0, 0.0)])).unwrap();

        let direct = 1.04f32.sqrt();
        assert_eq!(scan.transmitter, 0);
        assert!(scan.sensors[0].is_transmitter);
        assert!(!scan.sensors[1].is_transmitter);
        assert_relative_eq!(scan.sensors[0].echoes[0].begin_distance, direct, epsilon = 1e-5);
        assert_relative_eq!(scan.sensors[1].echoes[0].begin_distance, 2.0 * direct, epsilon = 1e-5);
        assert_relative_eq!(scan.sensors[1].echoes[0].power, 1.0 / 1.04, epsilon = 1e-4);
    }

    #[test]
    fn test_receiver_filters() {
        let mut hub = hub(
            UltrasonicHubConfig::default()
                .with_sensor(sensor_at("a", 0.0))
                .with_sensor(sensor_at("near", 0.0).with_distances(0.2, 0.5)),
        );
        let scan = hub
            .scan(&frame(
                0,
                vec![
                    wall_hit(0, 1.0, 0.0, 0.0),
                    // behind the sensors
                    wall_hit(1, -1.0, 0.0, 0.0),
                    RayHit::miss(2),
                    // grazing surface: weak return
                    RayHit::new(3, Point3::new(2.0, 0.0, 0.0), Vector3::y()),
                ],
            ))
            .unwrap();
        assert_eq!(scan.sensors[0].echoes.len(), 1);
        assert_eq!(scan.sensors[0].echoes[0].hits, vec![0]);
        assert!(scan.sensors[1].echoes.is_empty());
    }

    #[test]
    fn test_ground_filter() {
        let hits = vec![wall_hit(0, 1.0, 0.0, -0.5), wall_hit(1, 1.5, 0.0, 0.0)];
        let base = UltrasonicHubConfig::default().with_sensor(sensor_at("a", 0.0));

        let scan = hub(base.clone()).scan(&frame(0, hits.clone())).unwrap();
        assert_eq!(scan.sensors[0].echoes.len(), 2);

        let scan = hub(base.with_ground_filter(0.25)).scan(&frame(0, hits)).unwrap();
        assert_eq!(scan.sensors[0].echoes.len(), 1);
        assert_eq!(scan.sensors[0].echoes[0].hits, vec![1]);
    }

    #[test]
    fn test_echoes_pruned_and_sorted() {
        let mut hub = hub(UltrasonicHubConfig::default().with_sensor(sensor_at("a", 0.0)));
        let hits = (0..5).map(|i| wall_hit(i, 0.4 + 0.4 * i as f32, 0.0, 0.0)).collect();
        let scan = hub.scan(&frame(0, hits)).unwrap();

        let echoes = &scan.sensors[0].echoes;
        assert_eq!(echoes.len(), 3);
        assert!(echoes.windows(2).all(|w| w[0].begin_distance <= w[1].begin_distance));
        // power falls with distance, so the nearest three survive
        assert_relative_eq!(echoes[2].begin_distance, 1.2, epsilon = 1e-5);
    }

    #[test]
    fn test_echo_limit_from_params() {
        let params = RuntimeParams::new();
        params.set("ultrasonic.echos_max_num", 1).unwrap();
        let config = UltrasonicHubConfig::default()
            .with_sensor(sensor_at("a", 0.0))
            .with_params(&params);
        assert_eq!(config.echos_max_num, 1);

        let hits = (0..3).map(|i| wall_hit(i, 0.4 + 0.4 * i as f32, 0.0, 0.0)).collect();
        let scan = hub(config).scan(&frame(0, hits)).unwrap();
        assert_eq!(scan.sensors[0].echoes.len(), 1);
        assert_relative_eq!(scan.sensors[0].echoes[0].begin_distance, 0.4, epsilon = 1e-5);
    }

    #[test]
    fn test_activation_and_bad_frames() {
        let adapter = SensorPublishAdapter::new(Arc::new(NullPublisher));
        let err = UltrasonicHubProcessor::new("hub", UltrasonicHubConfig::default(), adapter.clone())
            .err()
            .unwrap();
        assert!(err.is_activation_error());

        let empty = UltrasonicHubConfig::default()
            .with_sensor(UltrasonicSensorConfig::default().with_resolution(0, 50));
        let err = UltrasonicHubProcessor::new("hub", empty, adapter).err().unwrap();
        assert!(matches!(err, SodaError::EmptyRaySet(_)));

        let mut hub = hub(UltrasonicHubConfig::default().with_sensor(sensor_at("a", 0.0)));
        hub.process(&mut frame(4, vec![]));
        assert_eq!(hub.bad_transmitter_frames(), 1);
    }
}
