//! Fisheye camera model
//!
//! Polynomial (Kannala-Brandt style) radial model:
//!
//! ```text
//! r(θ) = θ · (1 + k1·θ² + k2·θ⁴ + k3·θ⁶ + k4·θ⁸)
//! ```
//!
//! where θ is the angle between the ray and the optical axis (+z) and r is
//! the normalized radial distance of the pixel from the principal point.
//! Image v grows downwards while the camera y axis points up.
//!
//! The inverse mapping solves r(θ) for θ with Newton-Raphson. Its iteration
//! cap and tolerance define which pixels get a ray at all, so they are part
//! of the model's contract and must not be tuned per call site.

use nalgebra::{Vector2, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use soda_core::error::{SodaError, SodaResult};

/// Maximum Newton-Raphson steps for the inverse projection
pub const NEWTON_MAX_ITERATIONS: usize = 10;

/// Convergence threshold on |r(θ) - r|
pub const NEWTON_TOLERANCE: f64 = 1e-6;

/// Offset added to the forward radius so the on-axis ray does not divide by zero
const FORWARD_RADIUS_EPS: f64 = 1e-8;

/// Camera intrinsics and distortion coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FisheyeIntrinsics {
    /// Focal length along u (pixels)
    pub fx: f64,
    /// Focal length along v (pixels)
    pub fy: f64,
    /// Principal point u (pixels)
    pub cx: f64,
    /// Principal point v (pixels)
    pub cy: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

impl Default for FisheyeIntrinsics {
    /// Undistorted 800x800 camera with a 90 degree field of view
    fn default() -> Self {
        Self {
            fx: 400.0,
            fy: 400.0,
            cx: 400.0,
            cy: 400.0,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
            k4: 0.0,
        }
    }
}

impl FisheyeIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            ..Default::default()
        }
    }

    pub fn with_distortion(mut self, k1: f64, k2: f64, k3: f64, k4: f64) -> Self {
        self.k1 = k1;
        self.k2 = k2;
        self.k3 = k3;
        self.k4 = k4;
        self
    }

    /// Reject intrinsics that can never produce a valid projection
    pub fn validate(&self) -> SodaResult<()> {
        if !(self.fx.is_finite() && self.fx > 0.0) || !(self.fy.is_finite() && self.fy > 0.0) {
            return Err(SodaError::InvalidIntrinsics(format!(
                "focal lengths must be positive, got fx={} fy={}",
                self.fx, self.fy
            )));
        }
        let rest = [self.cx, self.cy, self.k1, self.k2, self.k3, self.k4];
        if rest.iter().any(|v| !v.is_finite()) {
            return Err(SodaError::InvalidIntrinsics(
                "principal point and distortion coefficients must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// One entry of a per-pixel ray table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRay {
    /// Unit direction in camera space (x right, y up, z forward)
    pub dir: [f32; 3],
    /// False when the inverse projection did not converge
    pub valid: bool,
}

impl PixelRay {
    pub const INVALID: PixelRay = PixelRay {
        dir: [0.0; 3],
        valid: false,
    };
}

/// Row-major table of camera rays, one per pixel centre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelRayMap {
    pub width: u32,
    pub height: u32,
    pub rays: Vec<PixelRay>,
}

impl PixelRayMap {
    pub fn get(&self, x: u32, y: u32) -> Option<&PixelRay> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.rays.get((y * self.width + x) as usize)
    }

    pub fn invalid_count(&self) -> usize {
        self.rays.iter().filter(|r| !r.valid).count()
    }
}

/// Forward and inverse fisheye projection
#[derive(Debug, Clone)]
pub struct FisheyeProjectionModel {
    intrinsics: FisheyeIntrinsics,
}

impl FisheyeProjectionModel {
    /// Build a model, failing on invalid intrinsics
    pub fn new(intrinsics: FisheyeIntrinsics) -> SodaResult<Self> {
        intrinsics.validate()?;
        Ok(Self { intrinsics })
    }

    pub fn intrinsics(&self) -> &FisheyeIntrinsics {
        &self.intrinsics
    }

    fn distort(&self, theta: f64) -> f64 {
        let k = &self.intrinsics;
        let t2 = theta * theta;
        theta * (1.0 + t2 * (k.k1 + t2 * (k.k2 + t2 * (k.k3 + t2 * k.k4))))
    }

    fn distort_derivative(&self, theta: f64) -> f64 {
        let k = &self.intrinsics;
        let t2 = theta * theta;
        1.0 + t2 * (3.0 * k.k1 + t2 * (5.0 * k.k2 + t2 * (7.0 * k.k3 + t2 * 9.0 * k.k4)))
    }

    /// Pixel to unit ray.
    ///
    /// Returns `None` when Newton-Raphson does not reach
    /// [`NEWTON_TOLERANCE`] within [`NEWTON_MAX_ITERATIONS`] steps.
    pub fn project_pixel_to_ray(&self, u: f64, v: f64) -> Option<Vector3<f64>> {
        let k = &self.intrinsics;
        let x = (u - k.cx) / k.fx;
        let y = -(v - k.cy) / k.fy;
        let r = (x * x + y * y).sqrt();
        if r == 0.0 {
            return Some(Vector3::z());
        }
        let (cos_phi, sin_phi) = (x / r, y / r);

        let mut theta = r;
        let mut converged = false;
        for _ in 0..NEWTON_MAX_ITERATIONS {
            theta -= (self.distort(theta) - r) / self.distort_derivative(theta);
            if (self.distort(theta) - r).abs() < NEWTON_TOLERANCE {
                converged = true;
                break;
            }
        }
        if !converged || !theta.is_finite() || theta < 0.0 {
            return None;
        }

        let sin_theta = theta.sin();
        Some(Vector3::new(
            sin_theta * cos_phi,
            sin_theta * sin_phi,
            theta.cos(),
        ))
    }

    /// Camera-space ray (need not be unit length) to pixel
    pub fn project_ray_to_pixel(&self, ray: &Vector3<f64>) -> Vector2<f64> {
        let k = &self.intrinsics;
        let r = (ray.x * ray.x + ray.y * ray.y).sqrt() + FORWARD_RADIUS_EPS;
        let (cs, sn) = (ray.x / r, ray.y / r);
        let theta = r.atan2(ray.z);
        let theta_nl = self.distort(theta);
        Vector2::new(
            k.fx * cs * theta_nl + k.cx,
            -k.fy * sn * theta_nl + k.cy,
        )
    }

    /// Compute one ray per pixel centre of a `width` x `height` image.
    ///
    /// Non-converging pixels are marked invalid and reported once here, not
    /// on every frame that later samples the table.
    pub fn build_pixel_ray_map(&self, width: u32, height: u32) -> PixelRayMap {
        let w = width as usize;
        let rays: Vec<PixelRay> = (0..w * height as usize)
            .into_par_iter()
            .map(|i| {
                let (x, y) = ((i % w) as f64, (i / w) as f64);
                match self.project_pixel_to_ray(x, y) {
                    Some(dir) => PixelRay {
                        dir: [dir.x as f32, dir.y as f32, dir.z as f32],
                        valid: true,
                    },
                    None => PixelRay::INVALID,
                }
            })
            .collect();

        let map = PixelRayMap {
            width,
            height,
            rays,
        };
        let failed = map.invalid_count();
        if failed > 0 {
            tracing::warn!(
                "Fisheye inverse projection did not converge for {} of {} pixels",
                failed,
                map.rays.len()
            );
        }
        map
    }
}
