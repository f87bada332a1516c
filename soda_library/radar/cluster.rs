//! Cluster-mode radar: hits grouped by range along the beam
//!
//! Hits are buffered during the scan and grouped in [`RadarClusterEngine::finalize`].
//! Grouping runs over the hits sorted by (distance, azimuth, x, y) and all
//! aggregates are computed from the complete member set, so the result does
//! not depend on the order the raycaster reported hits in.

use super::hit::RadarHit;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default range depth of one cluster (m)
pub const DEFAULT_MAX_DIST_DIFF: f32 = 1.0;

/// One detection reported in cluster mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarCluster {
    /// Azimuth of the closest member (degrees)
    pub azimuth: f32,
    /// Range of the closest member (m)
    pub distance: f32,
    /// Summed RCS of all members
    pub rcs: f32,
    /// Mean lateral relative velocity (m/s)
    pub lat: f32,
    /// Mean longitudinal relative velocity (m/s)
    pub lon: f32,
    /// Closest member position, radar frame
    pub local_position: Point3<f32>,
    /// Closest member position, world frame
    pub position: Point3<f32>,
    /// Batch indices of the member hits
    pub hits: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct RadarClusterEngine {
    max_dist_diff: f32,
    hits: Vec<RadarHit>,
    clusters: Vec<RadarCluster>,
}

impl Default for RadarClusterEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIST_DIFF)
    }
}

fn hit_order(a: &RadarHit, b: &RadarHit) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.azimuth.total_cmp(&b.azimuth))
        .then(a.local_position.x.total_cmp(&b.local_position.x))
        .then(a.local_position.y.total_cmp(&b.local_position.y))
}

struct Group {
    members: Vec<usize>,
    min_distance: f32,
    max_distance: f32,
    min_azimuth: f32,
    max_azimuth: f32,
}

impl RadarClusterEngine {
    pub fn new(max_dist_diff: f32) -> Self {
        Self {
            max_dist_diff,
            hits: Vec::new(),
            clusters: Vec::new(),
        }
    }

    pub fn max_dist_diff(&self) -> f32 {
        self.max_dist_diff
    }

    /// Drop the hits and clusters of the previous scan
    pub fn clear(&mut self) {
        self.hits.clear();
        self.clusters.clear();
    }

    pub fn add_hit(&mut self, hit: RadarHit) {
        self.hits.push(hit);
    }

    pub fn pending_hits(&self) -> usize {
        self.hits.len()
    }

    /// Group the buffered hits and compute cluster aggregates
    pub fn finalize(&mut self) -> &[RadarCluster] {
        self.clusters.clear();
        self.hits.sort_by(hit_order);

        let mut groups: Vec<Group> = Vec::new();
        for (i, hit) in self.hits.iter().enumerate() {
            // hits arrive by increasing distance, so the group's closest member bounds the span
            let mut target: Option<usize> = None;
            for (k, g) in groups.iter().enumerate() {
                let fits = hit.distance - g.min_distance <= self.max_dist_diff
                    && g.max_azimuth.max(hit.azimuth) - g.min_azimuth.min(hit.azimuth)
                        <= hit.resolution;
                // smallest gap to the hit wins, ties go to the older group
                if fits && target.map_or(true, |t| g.max_distance > groups[t].max_distance) {
                    target = Some(k);
                }
            }
            match target {
                Some(k) => {
                    let g = &mut groups[k];
                    g.members.push(i);
                    g.max_distance = g.max_distance.max(hit.distance);
                    g.min_azimuth = g.min_azimuth.min(hit.azimuth);
                    g.max_azimuth = g.max_azimuth.max(hit.azimuth);
                }
                None => groups.push(Group {
                    members: vec![i],
                    min_distance: hit.distance,
                    max_distance: hit.distance,
                    min_azimuth: hit.azimuth,
                    max_azimuth: hit.azimuth,
                }),
            }
        }

        for g in &groups {
            let closest = &self.hits[g.members[0]];
            let n = g.members.len() as f32;
            let (mut rcs, mut lat, mut lon) = (0.0, 0.0, 0.0);
            for &m in &g.members {
                let h = &self.hits[m];
                rcs += h.rcs;
                lat += h.velocity.y;
                lon += h.velocity.x;
            }
            self.clusters.push(RadarCluster {
                azimuth: closest.azimuth,
                distance: closest.distance,
                rcs,
                lat: lat / n,
                lon: lon / n,
                local_position: closest.local_position,
                position: closest.position,
                hits: g.members.iter().map(|&m| self.hits[m].source).collect(),
            });
        }

        tracing::trace!(
            "Radar clustering: {} hits -> {} clusters",
            self.hits.len(),
            self.clusters.len()
        );
        &self.clusters
    }

    pub fn clusters(&self) -> &[RadarCluster] {
        &self.clusters
    }

    pub fn take_clusters(&mut self) -> Vec<RadarCluster> {
        std::mem::take(&mut self.clusters)
    }
}
