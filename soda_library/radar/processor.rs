//! Radar sensor processor

use super::cluster::{RadarClusterEngine, DEFAULT_MAX_DIST_DIFF};
use super::hit::{process_hit, RadarView};
use super::object::{RadarObjectTracker, DEFAULT_OBJECTS_MAX_NUM};
use super::params::{
    RadarBeam, RadarParams, RadarRcsTable, DEFAULT_OBJECT_MODE_RCS_MULTIPLIER,
    DEFAULT_RADAR_PERIOD,
};
use crate::messages::{RadarDetections, RadarScan};
use crate::publish::SensorPublishAdapter;
use crate::scene::{HitBatch, RaySegment};
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};
use soda_core::error::{SodaError, SodaResult};
use soda_core::params::RuntimeParams;
use soda_core::scheduling::SensorProcessor;
use std::time::Duration;

/// What a radar reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadarMode {
    /// Per-scan clusters of hits
    #[default]
    Cluster,
    /// Entities tracked across scans
    Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub mode: RadarMode,
    /// Bands scanned every period, beams enumerated band by band
    pub bands: Vec<RadarParams>,
    /// Minimum time between scans (s)
    pub period: f32,
    /// Range depth of one cluster (m)
    pub max_dist_diff: f32,
    pub objects_max_num: usize,
    pub object_mode_rcs_multiplier: f32,
    pub rcs: RadarRcsTable,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            mode: RadarMode::default(),
            bands: vec![RadarParams::default()],
            period: DEFAULT_RADAR_PERIOD,
            max_dist_diff: DEFAULT_MAX_DIST_DIFF,
            objects_max_num: DEFAULT_OBJECTS_MAX_NUM,
            object_mode_rcs_multiplier: DEFAULT_OBJECT_MODE_RCS_MULTIPLIER,
            rcs: RadarRcsTable::default(),
        }
    }
}

impl RadarConfig {
    pub fn with_mode(mut self, mode: RadarMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_bands(mut self, bands: Vec<RadarParams>) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_period(mut self, period: f32) -> Self {
        self.period = period;
        self
    }

    /// Override scan timing and tracking limits from the `radar.*` parameters
    pub fn with_params(mut self, params: &RuntimeParams) -> Self {
        self.period = params.get_or("radar.period", self.period);
        self.max_dist_diff = params.get_or("radar.max_dist_diff", self.max_dist_diff);
        self.objects_max_num = params.get_usize("radar.objects_max_num", self.objects_max_num);
        self
    }

    pub fn validate(&self, sensor: &str) -> SodaResult<()> {
        for band in self.bands.iter().filter(|b| b.enabled) {
            band.validate()
                .map_err(|e| SodaError::activation(sensor, e.to_string()))?;
        }
        if self.beams().is_empty() {
            return Err(SodaError::EmptyRaySet(sensor.to_string()));
        }
        if !(self.period >= 0.0) || !(self.max_dist_diff > 0.0) {
            return Err(SodaError::activation(
                sensor,
                format!(
                    "period {} and max_dist_diff {} must be non-negative / positive",
                    self.period, self.max_dist_diff
                ),
            ));
        }
        Ok(())
    }

    /// Beams of all enabled bands with the index of their band
    pub fn beams(&self) -> Vec<(usize, RadarBeam)> {
        self.bands
            .iter()
            .enumerate()
            .filter(|(_, b)| b.enabled)
            .flat_map(|(i, b)| b.beams().into_iter().map(move |beam| (i, beam)))
            .collect()
    }

    /// Sweep segments for a radar at `pose`, in beam order (the hit `ray_index` space)
    pub fn ray_segments(&self, pose: &Isometry3<f32>) -> Vec<RaySegment> {
        self.beams().iter().map(|(_, b)| b.segment(pose)).collect()
    }
}

/// Turns one batch of beam hits into a [`RadarScan`]
pub struct RadarProcessor {
    name: String,
    config: RadarConfig,
    /// Band index of every beam, indexed by ray
    beam_band: Vec<usize>,
    clusters: RadarClusterEngine,
    objects: RadarObjectTracker,
    publisher: SensorPublishAdapter,
    last_scan: Option<Duration>,
    measurement_counter: u16,
    stray_hits: u64,
}

impl RadarProcessor {
    pub fn new(name: &str, config: RadarConfig, publisher: SensorPublishAdapter) -> SodaResult<Self> {
        config.validate(name)?;
        let beam_band = config.beams().into_iter().map(|(band, _)| band).collect();
        Ok(Self {
            name: name.to_string(),
            clusters: RadarClusterEngine::new(config.max_dist_diff),
            objects: RadarObjectTracker::new(config.objects_max_num),
            config,
            beam_band,
            publisher,
            last_scan: None,
            measurement_counter: 0,
            stray_hits: 0,
        })
    }

    pub fn config(&self) -> &RadarConfig {
        &self.config
    }

    pub fn tracker(&self) -> &RadarObjectTracker {
        &self.objects
    }

    /// Hits whose ray index matched no beam
    pub fn stray_hits(&self) -> u64 {
        self.stray_hits
    }

    /// Run one scan over `batch`, or `None` if the scan period has not elapsed
    pub fn scan(&mut self, batch: &HitBatch) -> Option<RadarScan> {
        let now = batch.header.timestamp;
        if let Some(last) = self.last_scan {
            let period = Duration::from_millis((self.config.period * 1000.0).round() as u64);
            if now.saturating_sub(last) < period {
                return None;
            }
        }
        self.last_scan = Some(now);

        self.clusters.clear();
        self.objects.reset_scan();

        let view = RadarView {
            pose: batch.sensor_pose,
            velocity: batch.sensor_velocity,
        };
        for (i, hit) in batch.hits.iter().enumerate() {
            let Some(&band) = self.beam_band.get(hit.ray_index) else {
                self.stray_hits += 1;
                continue;
            };
            let params = &self.config.bands[band];
            let Some(mut radar_hit) = process_hit(params, &self.config.rcs, &view, i, hit) else {
                continue;
            };
            match self.config.mode {
                RadarMode::Cluster => self.clusters.add_hit(radar_hit),
                RadarMode::Object => {
                    radar_hit.rcs *= self.config.object_mode_rcs_multiplier;
                    self.objects.add_hit(&radar_hit, now);
                }
            }
        }

        let detections = match self.config.mode {
            RadarMode::Cluster => {
                self.clusters.finalize();
                RadarDetections::Clusters(self.clusters.take_clusters())
            }
            RadarMode::Object => {
                self.objects.finish_scan(now);
                RadarDetections::Objects(
                    self.objects.sorted_by_distance().into_iter().cloned().collect(),
                )
            }
        };

        let scan = RadarScan {
            header: batch.header.clone(),
            measurement_counter: self.measurement_counter,
            detections,
        };
        self.measurement_counter = self.measurement_counter.wrapping_add(1);
        Some(scan)
    }
}

impl SensorProcessor for RadarProcessor {
    type Frame = HitBatch;

    fn process(&mut self, batch: &mut HitBatch) {
        match self.scan(batch) {
            Some(scan) => {
                tracing::trace!("[{}] radar scan with {} detections", self.name, scan.detections.len());
                self.publisher.publish(scan);
            }
            None => tracing::trace!("[{}] radar period not elapsed", self.name),
        }
    }

    fn on_finish(&mut self) {
        if self.stray_hits > 0 {
            tracing::warn!(
                "[{}] {} hits referenced rays outside the beam set",
                self.name,
                self.stray_hits
            );
        }
    }
}
