//! Raycast result to radar detection

use super::params::{RadarParams, RadarRcsTable};
use crate::scene::{EntityId, ObjectCategory, RayHit};
use nalgebra::{Isometry3, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A raycast hit that passed the radar's detection filters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarHit {
    /// Index of the originating [`RayHit`] in its batch
    pub source: usize,
    pub entity: EntityId,
    /// Degrees from boresight, positive to the left
    pub azimuth: f32,
    pub rcs: f32,
    /// World position, flattened onto the radar's horizontal plane
    pub position: Point3<f32>,
    /// Position in the radar frame, z = 0
    pub local_position: Point3<f32>,
    /// Entity velocity relative to the radar, radar frame (m/s)
    pub velocity: Vector3<f32>,
    /// Angular resolution at this azimuth (degrees)
    pub resolution: f32,
    pub category: ObjectCategory,
    /// Range from the radar (m)
    pub distance: f32,
}

/// Radar pose and motion used to evaluate a batch
#[derive(Debug, Clone, Copy)]
pub struct RadarView {
    pub pose: Isometry3<f32>,
    pub velocity: Vector3<f32>,
}

/// Apply the detection filters of `params` to one raycast result.
///
/// Returns `None` for misses, unclassified entities, hits outside the band
/// envelope and signals below `min_signal_coef`.
pub fn process_hit(
    params: &RadarParams,
    rcs_table: &RadarRcsTable,
    view: &RadarView,
    source: usize,
    hit: &RayHit,
) -> Option<RadarHit> {
    if !hit.blocking {
        return None;
    }
    let entity = hit.entity?;

    let mut local = view.pose.inverse_transform_point(&hit.position);
    local.z = 0.0;
    let distance = local.coords.norm();
    if distance <= 0.0 || distance > params.distance_max {
        return None;
    }
    let azimuth = local.y.atan2(local.x).to_degrees();
    if azimuth.abs() > params.fov_horizont_max {
        return None;
    }

    let category = hit.category?;
    let rcs = rcs_table.rcs_for(category);
    if rcs < params.min_signal_coef {
        return None;
    }

    let velocity = view
        .pose
        .rotation
        .inverse_transform_vector(&(hit.entity_velocity - view.velocity));

    Some(RadarHit {
        source,
        entity,
        azimuth,
        rcs,
        position: view.pose * local,
        local_position: local,
        velocity,
        resolution: params.get_resolution_for_angle(azimuth),
        category,
        distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn view() -> RadarView {
        RadarView {
            pose: Isometry3::from_parts(
                Translation3::new(10.0, 0.0, 0.5),
                UnitQuaternion::from_euler_angles(0.0, 0.0, std::f32::consts::FRAC_PI_2),
            ),
            velocity: Vector3::new(0.0, 5.0, 0.0),
        }
    }

    fn car_hit(position: Point3<f32>) -> RayHit {
        RayHit::new(0, position, Vector3::x())
            .with_entity(7, Some(ObjectCategory::Vehicles))
            .with_velocity(Vector3::new(0.0, 2.0, 0.0))
    }

    #[test]
    fn test_hit_in_radar_frame() {
        // radar at (10, 0) facing +y; target 20 m ahead and 1 m above the radar
        let hit = process_hit(
            &RadarParams::default(),
            &RadarRcsTable::default(),
            &view(),
            3,
            &car_hit(Point3::new(10.0, 20.0, 1.5)),
        )
        .unwrap();

        assert_eq!(hit.source, 3);
        assert_eq!(hit.entity, 7);
        assert_relative_eq!(hit.distance, 20.0, epsilon = 1e-4);
        assert_relative_eq!(hit.azimuth, 0.0, epsilon = 1e-3);
        assert_relative_eq!(hit.local_position.z, 0.0);
        assert_relative_eq!(hit.position.z, 0.5, epsilon = 1e-5);
        // closing at 3 m/s along the boresight
        assert_relative_eq!(hit.velocity.x, -3.0, epsilon = 1e-5);
        assert_relative_eq!(hit.velocity.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(hit.rcs, 3.0);
        assert_relative_eq!(hit.resolution, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_filters() {
        let params = RadarParams::default();
        let rcs = RadarRcsTable::default();
        let v = view();

        // behind the radar
        assert!(process_hit(&params, &rcs, &v, 0, &car_hit(Point3::new(10.0, -20.0, 0.5))).is_none());
        // beyond distance_max
        assert!(process_hit(&params, &rcs, &v, 0, &car_hit(Point3::new(10.0, 80.0, 0.5))).is_none());
        // miss
        assert!(process_hit(&params, &rcs, &v, 0, &RayHit::miss(0)).is_none());
        // unclassified
        let unknown = RayHit::new(0, Point3::new(10.0, 20.0, 0.5), Vector3::x()).with_entity(1, None);
        assert!(process_hit(&params, &rcs, &v, 0, &unknown).is_none());
        // too weak
        let weak = RadarParams {
            min_signal_coef: 0.01,
            ..Default::default()
        };
        let building = RayHit::new(0, Point3::new(10.0, 20.0, 0.5), Vector3::x())
            .with_entity(2, Some(ObjectCategory::Buildings));
        assert!(process_hit(&weak, &rcs, &v, 0, &building).is_none());
        assert!(process_hit(&params, &rcs, &v, 0, &building).is_some());
    }
}
