//! Ray to depth-texture projection and sampling
//!
//! The depth camera looks along +x of the sensor frame (y left, z up). Rays
//! go through a reversed-z perspective projection built from the camera's
//! horizontal FOV and the texture aspect, then map onto texel coordinates
//! spanning `0..=width-1` and `0..=height-1`.

use super::rays::Interpolation;
use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use soda_core::error::{SodaError, SodaResult};

/// Near plane of the reversed-z projection
const NEAR_PLANE: f32 = 0.1;

/// Texel coordinates of one ray
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UvEntry {
    pub u: f32,
    pub v: f32,
    /// False for rays that do not point into the camera's half space
    pub valid: bool,
}

/// Per-ray texel coordinates in ray enumeration order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectionMap {
    pub width: u32,
    pub height: u32,
    pub entries: Vec<UvEntry>,
}

impl ProjectionMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rays that can never be sampled with `interpolation`
    pub fn out_of_texture(&self, interpolation: Interpolation) -> usize {
        self.entries
            .iter()
            .filter(|e| texels(e, self.width, self.height, interpolation).is_none())
            .count()
    }
}

/// Texel footprint of an entry
enum Footprint {
    Single(usize),
    Quad {
        x: f32,
        y: f32,
        x1: f32,
        y1: f32,
        q11: usize,
        q12: usize,
        q21: usize,
        q22: usize,
    },
}

fn texels(entry: &UvEntry, width: u32, height: u32, interpolation: Interpolation) -> Option<Footprint> {
    if !entry.valid {
        return None;
    }
    let (w, h) = (width as i64, height as i64);
    let inside = |x: i64, y: i64| x >= 0 && y >= 0 && x < w && y < h;
    match interpolation {
        Interpolation::Nearest => {
            let x = (entry.u + 0.5).floor() as i64;
            let y = (entry.v + 0.5).floor() as i64;
            inside(x, y).then(|| Footprint::Single((y * w + x) as usize))
        }
        Interpolation::Bilinear | Interpolation::Min => {
            let x1 = entry.u.floor() as i64;
            let y1 = entry.v.floor() as i64;
            let (x2, y2) = (x1 + 1, y1 + 1);
            if !(inside(x1, y1) && inside(x2, y2)) {
                return None;
            }
            let at = |x: i64, y: i64| (y * w + x) as usize;
            Some(Footprint::Quad {
                x: entry.u,
                y: entry.v,
                x1: x1 as f32,
                y1: y1 as f32,
                q11: at(x1, y1),
                q12: at(x1, y2),
                q21: at(x2, y1),
                q22: at(x2, y2),
            })
        }
    }
}

/// Read the depth of ray `index` from a row-major `depth` texture.
///
/// Returns `None` when the ray or any texel it needs lies outside the texture.
pub fn sample_depth(
    map: &ProjectionMap,
    depth: &[f32],
    index: usize,
    interpolation: Interpolation,
) -> Option<f32> {
    let entry = map.entries.get(index)?;
    match texels(entry, map.width, map.height, interpolation)? {
        Footprint::Single(i) => depth.get(i).copied(),
        Footprint::Quad {
            x,
            y,
            x1,
            y1,
            q11,
            q12,
            q21,
            q22,
        } => {
            let (q11, q12, q21, q22) = (
                *depth.get(q11)?,
                *depth.get(q12)?,
                *depth.get(q21)?,
                *depth.get(q22)?,
            );
            if interpolation == Interpolation::Min {
                return Some(q11.min(q12).min(q21.min(q22)));
            }
            let (dx, dy) = (x - x1, y - y1);
            Some(
                q11 * (1.0 - dx) * (1.0 - dy)
                    + q21 * dx * (1.0 - dy)
                    + q12 * (1.0 - dx) * dy
                    + q22 * dx * dy,
            )
        }
    }
}

/// Perspective projection of a depth camera onto its texture
#[derive(Debug, Clone)]
pub struct SampledRayProjector {
    fov: f32,
    width: u32,
    height: u32,
    view_projection: Matrix4<f32>,
}

impl SampledRayProjector {
    pub fn new(fov_deg: f32, width: u32, height: u32) -> SodaResult<Self> {
        if !(fov_deg > 0.0 && fov_deg < 180.0) {
            return Err(SodaError::Config(format!("projection FOV {} outside (0, 180)", fov_deg)));
        }
        if width == 0 || height == 0 {
            return Err(SodaError::Config(format!("texture {}x{} is empty", width, height)));
        }

        let half = (fov_deg / 2.0).to_radians();
        let aspect = width as f32 / height as f32;
        // sensor (x forward, y left, z up) -> view (x right, y up, z forward)
        #[rustfmt::skip]
        let view = Matrix4::new(
            0.0, -1.0, 0.0, 0.0,
            0.0,  0.0, 1.0, 0.0,
            1.0,  0.0, 0.0, 0.0,
            0.0,  0.0, 0.0, 1.0,
        );
        #[rustfmt::skip]
        let projection = Matrix4::new(
            1.0 / half.tan(), 0.0,                 0.0, 0.0,
            0.0,              aspect / half.tan(), 0.0, 0.0,
            0.0,              0.0,                 0.0, NEAR_PLANE,
            0.0,              0.0,                 1.0, 0.0,
        );

        Ok(Self {
            fov: fov_deg,
            width,
            height,
            view_projection: projection * view,
        })
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn view_projection(&self) -> &Matrix4<f32> {
        &self.view_projection
    }

    /// Texel coordinates of a sensor-frame point
    pub fn project(&self, ray: &Vector3<f32>) -> UvEntry {
        let clip = self.view_projection * Vector4::new(ray.x, ray.y, ray.z, 1.0);
        if clip.w <= 0.0 {
            return UvEntry::default();
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let u = (0.5 + 0.5 * ndc_x) * (self.width - 1) as f32;
        let v = (0.5 - 0.5 * ndc_y) * (self.height - 1) as f32;
        UvEntry {
            u,
            v,
            valid: u.is_finite() && v.is_finite(),
        }
    }

    pub fn build_projection_map(&self, rays: &[Vector3<f32>]) -> ProjectionMap {
        ProjectionMap {
            width: self.width,
            height: self.height,
            entries: rays.iter().map(|r| self.project(r)).collect(),
        }
    }
}

/// One-shot [`SampledRayProjector::build_projection_map`]
pub fn build_projection_map(
    rays: &[Vector3<f32>],
    fov_deg: f32,
    width: u32,
    height: u32,
) -> SodaResult<ProjectionMap> {
    Ok(SampledRayProjector::new(fov_deg, width, height)?.build_projection_map(rays))
}
