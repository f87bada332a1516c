//! Echo merging for one ultrasonic receiver

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default number of echoes a receiver reports per tick
pub const DEFAULT_ECHOS_MAX_NUM: usize = 3;

/// A merged group of ray hits read as one physical reflection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltrasonicEcho {
    /// Shortest travelled distance among the members (m)
    pub begin_distance: f32,
    /// Longest travelled distance among the members (m)
    pub end_distance: f32,
    /// Strongest member power
    pub power: f32,
    /// World position of the hit that last lowered `begin_distance`
    pub position: Point3<f32>,
    /// Batch indices of the member hits
    pub hits: Vec<usize>,
}

impl UltrasonicEcho {
    fn new(hit: usize, position: Point3<f32>, distance: f32, power: f32) -> Self {
        Self {
            begin_distance: distance,
            end_distance: distance,
            power,
            position,
            hits: vec![hit],
        }
    }

    /// Whether `distance` falls in the echo interval widened by `gap` on both sides
    pub fn accepts(&self, distance: f32, gap: f32) -> bool {
        distance >= self.begin_distance - gap && distance <= self.end_distance + gap
    }

    fn join(&mut self, hit: usize, position: Point3<f32>, distance: f32, power: f32) {
        if distance < self.begin_distance {
            self.position = position;
        }
        self.begin_distance = self.begin_distance.min(distance);
        self.end_distance = self.end_distance.max(distance);
        self.power = self.power.max(power);
        self.hits.push(hit);
    }
}

/// Echo collection of one receiver during one tick
#[derive(Debug, Clone, Default)]
pub struct UltrasonicEchos {
    echoes: Vec<UltrasonicEcho>,
}

impl UltrasonicEchos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.echoes.clear();
    }

    pub fn len(&self) -> usize {
        self.echoes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.echoes.is_empty()
    }

    pub fn echoes(&self) -> &[UltrasonicEcho] {
        &self.echoes
    }

    /// Merge a hit into the first echo whose widened interval contains
    /// `distance`, or start a new echo.
    ///
    /// The echo position follows the hit that lowered the begin distance, so
    /// it depends on the order hits are added in.
    pub fn add_hit(
        &mut self,
        hit: usize,
        position: Point3<f32>,
        distance: f32,
        power: f32,
        gap: f32,
    ) {
        match self.echoes.iter_mut().find(|e| e.accepts(distance, gap)) {
            Some(echo) => echo.join(hit, position, distance, power),
            None => self
                .echoes
                .push(UltrasonicEcho::new(hit, position, distance, power)),
        }
    }

    /// Keep the `max` strongest echoes. Returns how many were dropped.
    pub fn remove_excess_echos(&mut self, max: usize) -> usize {
        if self.echoes.len() <= max {
            return 0;
        }
        let dropped = self.echoes.len() - max;
        self.echoes
            .sort_by(|a, b| b.power.partial_cmp(&a.power).unwrap_or(Ordering::Equal));
        self.echoes.truncate(max);
        dropped
    }

    /// Order echoes nearest first
    pub fn sort_by_distance(&mut self) {
        self.echoes
            .sort_by(|a, b| a.begin_distance.total_cmp(&b.begin_distance));
    }

    pub fn take(&mut self) -> Vec<UltrasonicEcho> {
        std::mem::take(&mut self.echoes)
    }
}
