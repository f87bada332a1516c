//! Object-mode radar: per-entity tracking across scans
//!
//! Every scan calls [`RadarObjectTracker::reset_scan`], feeds hits through
//! [`RadarObjectTracker::add_hit`], then closes with
//! [`RadarObjectTracker::finish_scan`]. Objects are keyed by the owning
//! entity, so one entity never holds two radar ids. Ids come from a free
//! list and return to it when an object is evicted.

use super::hit::RadarHit;
use crate::scene::{EntityId, ObjectCategory};
use nalgebra::{Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

pub const DEFAULT_OBJECTS_MAX_NUM: usize = 50;

/// Upper bound of the detection-confidence counter
pub const PROBABILITY_COUNTER_MAX: i32 = 10;

/// Smallest extent of an object's bounds on every axis (m)
pub const MIN_BOX_SIZE: f32 = 0.1;

/// Largest id representable in the wire object id
const RADAR_ID_CAPACITY: usize = 256;

/// Axis-aligned box in the radar frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalBounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl LocalBounds {
    pub fn from_point(p: Point3<f32>) -> Self {
        Self { min: p, max: p }
    }

    pub fn extend(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn translate(&mut self, delta: &Vector3<f32>) {
        self.min += *delta;
        self.max += *delta;
    }

    /// Grow any axis thinner than `min_size`
    fn enforce_min_size(&mut self, min_size: f32) {
        let size = self.size();
        if size.x < min_size {
            self.max.x += min_size - size.x;
        }
        if size.y < min_size {
            self.min.y -= min_size / 2.0;
            self.max.y += min_size / 2.0;
        }
        if size.z < min_size {
            self.min.z -= min_size / 2.0;
            self.max.z += min_size / 2.0;
        }
    }
}

/// Tracking state carried between scans
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    /// (lon, lat) relative velocity at the previous scan
    pub prev_velocity: Vector2<f32>,
    pub acceleration: Vector2<f32>,
    pub prev_updated: Duration,
    pub probability_counter: i32,
    pub life_cycles: u64,
}

/// A tracked object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarObject {
    pub id: u8,
    pub entity: EntityId,
    pub category: ObjectCategory,
    pub rcs: f32,
    /// Lateral relative velocity (m/s)
    pub lat: f32,
    /// Longitudinal relative velocity (m/s)
    pub lon: f32,
    pub bounds: LocalBounds,
    /// Batch indices of the hits seen this scan
    pub hits: Vec<usize>,
    pub tracking: TrackingState,
    /// True if a hit touched the object during the current scan
    pub updated: bool,
    /// Nearest face centre, radar frame
    pub object_point: Point3<f32>,
    pub distance: f32,
    /// Degrees, positive to the left
    pub azimuth: f32,
}

#[derive(Debug, Clone)]
pub struct RadarObjectTracker {
    objects_max_num: usize,
    objects: BTreeMap<EntityId, RadarObject>,
    free_ids: BTreeSet<u8>,
}

impl Default for RadarObjectTracker {
    fn default() -> Self {
        Self::new(DEFAULT_OBJECTS_MAX_NUM)
    }
}

impl RadarObjectTracker {
    /// `objects_max_num` is capped at the 256 ids an 8-bit object id can carry
    pub fn new(objects_max_num: usize) -> Self {
        let objects_max_num = objects_max_num.min(RADAR_ID_CAPACITY);
        Self {
            objects_max_num,
            objects: BTreeMap::new(),
            free_ids: (0..objects_max_num).map(|id| id as u8).collect(),
        }
    }

    pub fn objects_max_num(&self) -> usize {
        self.objects_max_num
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, entity: EntityId) -> Option<&RadarObject> {
        self.objects.get(&entity)
    }

    pub fn objects(&self) -> impl Iterator<Item = &RadarObject> {
        self.objects.values()
    }

    /// Mark every object as not yet seen in the new scan
    pub fn reset_scan(&mut self) {
        for object in self.objects.values_mut() {
            object.updated = false;
        }
    }

    /// Fold a hit into its entity's object, creating one if there is room
    pub fn add_hit(&mut self, hit: &RadarHit, now: Duration) {
        if let Some(object) = self.objects.get_mut(&hit.entity) {
            if object.updated {
                object.bounds.extend(&hit.local_position);
                object.rcs += hit.rcs;
            } else {
                object.updated = true;
                object.bounds = LocalBounds::from_point(hit.local_position);
                object.rcs = hit.rcs;
                object.hits.clear();
            }
            object.lat = hit.velocity.y;
            object.lon = hit.velocity.x;
            object.hits.push(hit.source);
            return;
        }

        if self.objects.len() >= self.objects_max_num {
            return;
        }
        let Some(id) = self.free_ids.pop_first() else {
            return;
        };
        let (lat, lon) = (hit.velocity.y, hit.velocity.x);
        self.objects.insert(
            hit.entity,
            RadarObject {
                id,
                entity: hit.entity,
                category: hit.category,
                rcs: hit.rcs,
                lat,
                lon,
                bounds: LocalBounds::from_point(hit.local_position),
                hits: vec![hit.source],
                tracking: TrackingState {
                    prev_velocity: Vector2::new(lon, lat),
                    acceleration: Vector2::zeros(),
                    prev_updated: now,
                    probability_counter: 0,
                    life_cycles: 0,
                },
                updated: true,
                object_point: Point3::origin(),
                distance: 0.0,
                azimuth: 0.0,
            },
        );
    }

    /// Close the scan at time `now`: update tracking, decay or evict unseen objects
    pub fn finish_scan(&mut self, now: Duration) {
        let mut evicted = Vec::new();
        for (entity, object) in self.objects.iter_mut() {
            let dt = now.saturating_sub(object.tracking.prev_updated).as_secs_f32();
            let velocity = Vector2::new(object.lon, object.lat);
            let tracking = &mut object.tracking;
            tracking.life_cycles += 1;
            tracking.acceleration = if dt > 0.0 {
                (velocity - tracking.prev_velocity) / dt
            } else {
                Vector2::zeros()
            };
            tracking.prev_velocity = velocity;
            tracking.prev_updated = now;

            if object.updated {
                object.bounds.enforce_min_size(MIN_BOX_SIZE);
                tracking.probability_counter =
                    (tracking.probability_counter + 1).min(PROBABILITY_COUNTER_MAX);
            } else {
                tracking.probability_counter -= 1;
                if tracking.probability_counter < 0 {
                    evicted.push(*entity);
                    continue;
                }
                object
                    .bounds
                    .translate(&Vector3::new(object.lon * dt, object.lat * dt, 0.0));
            }

            let b = &object.bounds;
            object.object_point = Point3::new(b.min.x, (b.min.y + b.max.y) * 0.5, 0.0);
            object.distance = object.object_point.coords.norm();
            object.azimuth = object.object_point.y.atan2(object.object_point.x).to_degrees();
        }

        for entity in evicted {
            if let Some(object) = self.objects.remove(&entity) {
                tracing::debug!("Radar object {} (entity {}) lost", object.id, entity);
                self.free_ids.insert(object.id);
            }
        }
    }

    /// Objects ordered nearest first.
    ///
    /// Consumers read the closest target first; keep this order when publishing.
    pub fn sorted_by_distance(&self) -> Vec<&RadarObject> {
        let mut sorted: Vec<&RadarObject> = self.objects.values().collect();
        sorted.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hit(entity: EntityId, x: f32, y: f32, lon: f32) -> RadarHit {
        let local = Point3::new(x, y, 0.0);
        RadarHit {
            source: entity as usize,
            entity,
            azimuth: y.atan2(x).to_degrees(),
            rcs: 3.0,
            position: local,
            local_position: local,
            velocity: Vector3::new(lon, 0.0, 0.0),
            resolution: 1.0,
            category: ObjectCategory::Vehicles,
            distance: local.coords.norm(),
        }
    }

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn test_lowest_free_id_and_reuse() {
        let mut tracker = RadarObjectTracker::default();
        tracker.reset_scan();
        tracker.add_hit(&hit(100, 10.0, 0.0, 0.0), secs(0.0));
        tracker.add_hit(&hit(200, 20.0, 0.0, 0.0), secs(0.0));
        tracker.add_hit(&hit(300, 30.0, 0.0, 0.0), secs(0.0));
        tracker.finish_scan(secs(0.0));
        assert_eq!(tracker.get(100).unwrap().id, 0);
        assert_eq!(tracker.get(200).unwrap().id, 1);
        assert_eq!(tracker.get(300).unwrap().id, 2);

        // entity 200 disappears: counter 1 -> 0 keeps it, 0 -> -1 evicts it
        for t in 1..=2 {
            tracker.reset_scan();
            tracker.add_hit(&hit(100, 10.0, 0.0, 0.0), secs(0.07 * t as f32));
            tracker.add_hit(&hit(300, 30.0, 0.0, 0.0), secs(0.07 * t as f32));
            tracker.finish_scan(secs(0.07 * t as f32));
        }
        assert!(tracker.get(200).is_none());

        tracker.reset_scan();
        tracker.add_hit(&hit(400, 5.0, 0.0, 0.0), secs(0.21));
        tracker.finish_scan(secs(0.21));
        assert_eq!(tracker.get(400).unwrap().id, 1);
    }

    #[test]
    fn test_same_entity_single_object() {
        let mut tracker = RadarObjectTracker::default();
        tracker.reset_scan();
        tracker.add_hit(&hit(1, 10.0, -0.5, 0.0), secs(0.0));
        tracker.add_hit(&hit(1, 10.4, 0.5, 0.0), secs(0.0));
        tracker.finish_scan(secs(0.0));

        assert_eq!(tracker.len(), 1);
        let obj = tracker.get(1).unwrap();
        assert_relative_eq!(obj.rcs, 6.0);
        assert_eq!(obj.hits.len(), 2);
        assert_relative_eq!(obj.bounds.min.x, 10.0);
        assert_relative_eq!(obj.bounds.max.y, 0.5);
        // z collapsed to a plane, widened to the minimum box size
        assert_relative_eq!(obj.bounds.size().z, MIN_BOX_SIZE);
        assert_relative_eq!(obj.object_point.y, 0.0);
        assert_relative_eq!(obj.distance, 10.0);
    }

    #[test]
    fn test_capacity_limit() {
        let mut tracker = RadarObjectTracker::new(2);
        tracker.reset_scan();
        for e in 0..5 {
            tracker.add_hit(&hit(e, 10.0 + e as f32, 0.0, 0.0), secs(0.0));
        }
        tracker.finish_scan(secs(0.0));
        assert_eq!(tracker.len(), 2);
        assert!(tracker.get(0).is_some() && tracker.get(1).is_some());
    }

    #[test]
    fn test_unseen_object_is_extrapolated() {
        let mut tracker = RadarObjectTracker::default();
        tracker.reset_scan();
        tracker.add_hit(&hit(9, 20.0, 0.0, -10.0), secs(1.0));
        tracker.finish_scan(secs(1.0));
        tracker.reset_scan();
        tracker.add_hit(&hit(9, 19.0, 0.0, -10.0), secs(1.1));
        tracker.finish_scan(secs(1.1));
        let before = tracker.get(9).unwrap().bounds.min.x;

        tracker.reset_scan();
        tracker.finish_scan(secs(1.2));
        let obj = tracker.get(9).unwrap();
        assert!(!obj.updated);
        assert_relative_eq!(obj.bounds.min.x, before - 1.0, epsilon = 1e-3);
        assert_eq!(obj.tracking.probability_counter, 1);
    }

    #[test]
    fn test_acceleration() {
        let mut tracker = RadarObjectTracker::default();
        tracker.reset_scan();
        tracker.add_hit(&hit(5, 20.0, 0.0, -2.0), secs(0.0));
        tracker.finish_scan(secs(0.0));
        assert_eq!(tracker.get(5).unwrap().tracking.acceleration, Vector2::zeros());

        tracker.reset_scan();
        tracker.add_hit(&hit(5, 20.0, 0.0, -3.0), secs(0.5));
        tracker.finish_scan(secs(0.5));
        let acc = tracker.get(5).unwrap().tracking.acceleration;
        assert_relative_eq!(acc.x, -2.0, epsilon = 1e-4);
        assert_relative_eq!(acc.y, 0.0);
    }

    #[test]
    fn test_sorted_by_distance() {
        let mut tracker = RadarObjectTracker::default();
        tracker.reset_scan();
        tracker.add_hit(&hit(1, 30.0, 0.0, 0.0), secs(0.0));
        tracker.add_hit(&hit(2, 5.0, 0.0, 0.0), secs(0.0));
        tracker.add_hit(&hit(3, 15.0, 0.0, 0.0), secs(0.0));
        tracker.finish_scan(secs(0.0));
        let order: Vec<EntityId> = tracker.sorted_by_distance().iter().map(|o| o.entity).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }
}
