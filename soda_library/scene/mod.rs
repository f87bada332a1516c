//! Input types supplied by the physics/raycast collaborator
//!
//! All positions are in the world frame (x forward, y left, z up, metres)
//! unless a field says otherwise. A [`HitBatch`] carries the results of one
//! batched raycast call together with the pose of the sensor that cast it.

use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use soda_core::core::SensorHeader;

/// Stable identity of a scene entity (actor)
pub type EntityId = u64;

/// Semantic class of a scene entity as far as radar reflectivity goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    Buildings,
    Fences,
    Pedestrians,
    Poles,
    TrafficSigns,
    Vegetation,
    Vehicles,
    Walls,
}

impl ObjectCategory {
    pub const ALL: [ObjectCategory; 8] = [
        ObjectCategory::Buildings,
        ObjectCategory::Fences,
        ObjectCategory::Pedestrians,
        ObjectCategory::Poles,
        ObjectCategory::TrafficSigns,
        ObjectCategory::Vegetation,
        ObjectCategory::Vehicles,
        ObjectCategory::Walls,
    ];
}

/// One raycast result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// Index of the ray in the casting sensor's enumeration order
    pub ray_index: usize,
    /// False when the ray reached its end without a blocking hit
    pub blocking: bool,
    /// Impact point
    pub position: Point3<f32>,
    /// Surface normal at the impact point
    pub normal: Vector3<f32>,
    /// Entity that was hit, if any
    pub entity: Option<EntityId>,
    /// Reflectivity class of the entity, `None` when unclassified
    pub category: Option<ObjectCategory>,
    /// Linear velocity of the entity (m/s)
    pub entity_velocity: Vector3<f32>,
}

impl RayHit {
    /// A blocking hit on a static, unclassified surface
    pub fn new(ray_index: usize, position: Point3<f32>, normal: Vector3<f32>) -> Self {
        Self {
            ray_index,
            blocking: true,
            position,
            normal,
            entity: None,
            category: None,
            entity_velocity: Vector3::zeros(),
        }
    }

    /// A ray that did not hit anything
    pub fn miss(ray_index: usize) -> Self {
        Self {
            blocking: false,
            ..Self::new(ray_index, Point3::origin(), Vector3::zeros())
        }
    }

    pub fn with_entity(mut self, entity: EntityId, category: Option<ObjectCategory>) -> Self {
        self.entity = Some(entity);
        self.category = category;
        self
    }

    pub fn with_velocity(mut self, velocity: Vector3<f32>) -> Self {
        self.entity_velocity = velocity;
        self
    }
}

/// Hits of one batched raycast plus the state of the casting sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitBatch {
    pub header: SensorHeader,
    /// World pose of the sensor (or hub) that cast the rays
    pub sensor_pose: Isometry3<f32>,
    /// World linear velocity of the sensor
    pub sensor_velocity: Vector3<f32>,
    pub hits: Vec<RayHit>,
}

impl Default for HitBatch {
    fn default() -> Self {
        Self {
            header: SensorHeader::default(),
            sensor_pose: Isometry3::identity(),
            sensor_velocity: Vector3::zeros(),
            hits: Vec::new(),
        }
    }
}

impl HitBatch {
    /// Replace the contents, keeping the hit allocation
    pub fn fill(
        &mut self,
        header: SensorHeader,
        sensor_pose: Isometry3<f32>,
        sensor_velocity: Vector3<f32>,
        hits: &[RayHit],
    ) {
        self.header = header;
        self.sensor_pose = sensor_pose;
        self.sensor_velocity = sensor_velocity;
        self.hits.clear();
        self.hits.extend_from_slice(hits);
    }
}

/// Ray origin and direction in the world frame, ready for the raycaster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaySegment {
    pub start: Point3<f32>,
    pub end: Point3<f32>,
}
