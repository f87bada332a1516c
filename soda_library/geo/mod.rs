//! WGS-84 geodetic reference
//!
//! Converts between geodetic coordinates and the simulator's local frame.
//! The local frame is a local tangent plane (ENU: x east, y north, z up, in
//! metres) at a configured origin, rotated by a yaw offset about +z and
//! then translated. All internal math runs in f64; the `_f32` helpers are
//! the only place precision is reduced.
//!
//! Exactly antipodal points relative to the origin are not handled.

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// WGS-84 semimajor axis (m)
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 semiminor axis (m)
pub const WGS84_B: f64 = 6_356_752.314245;
/// Flattening
pub const WGS84_F: f64 = (WGS84_A - WGS84_B) / WGS84_A;
/// First eccentricity squared
pub const WGS84_E_SQ: f64 = WGS84_F * (2.0 - WGS84_F);

/// Geodetic coordinate (degrees, degrees, metres)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geodetic {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl Geodetic {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }
}

/// Origin and offsets of the local frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoReferenceConfig {
    /// Geodetic origin of the tangent plane
    pub origin: Geodetic,
    /// Rotation of the local frame about +z relative to ENU (degrees)
    pub yaw_offset_deg: f64,
    /// Local position of the tangent-plane origin (metres)
    pub translation: [f64; 3],
}

impl Default for GeoReferenceConfig {
    fn default() -> Self {
        Self {
            origin: Geodetic::new(59.995, 30.13, 0.0),
            yaw_offset_deg: 0.0,
            translation: [0.0; 3],
        }
    }
}

impl GeoReferenceConfig {
    pub fn with_origin(mut self, lat: f64, lon: f64, alt: f64) -> Self {
        self.origin = Geodetic::new(lat, lon, alt);
        self
    }

    pub fn with_yaw_offset(mut self, yaw_deg: f64) -> Self {
        self.yaw_offset_deg = yaw_deg;
        self
    }

    pub fn with_translation(mut self, x: f64, y: f64, z: f64) -> Self {
        self.translation = [x, y, z];
        self
    }
}

/// Precomputed geodetic reference frame
#[derive(Debug, Clone)]
pub struct GeoReference {
    config: GeoReferenceConfig,
    sin_lat: f64,
    cos_lat: f64,
    sin_lon: f64,
    cos_lon: f64,
    origin_ecef: Vector3<f64>,
    yaw: Rotation3<f64>,
}

impl GeoReference {
    pub fn new(config: GeoReferenceConfig) -> Self {
        let lat = config.origin.lat.to_radians();
        let lon = config.origin.lon.to_radians();
        let origin_ecef = geodetic_to_ecef(&config.origin);
        let yaw = Rotation3::from_axis_angle(&Vector3::z_axis(), config.yaw_offset_deg.to_radians());
        Self {
            sin_lat: lat.sin(),
            cos_lat: lat.cos(),
            sin_lon: lon.sin(),
            cos_lon: lon.cos(),
            origin_ecef,
            yaw,
            config,
        }
    }

    pub fn config(&self) -> &GeoReferenceConfig {
        &self.config
    }

    /// Geodetic to local frame
    pub fn to_local(&self, lat: f64, lon: f64, alt: f64) -> Vector3<f64> {
        let ecef = geodetic_to_ecef(&Geodetic::new(lat, lon, alt));
        let enu = self.ecef_to_enu(&ecef);
        let mut local = enu;
        if self.config.yaw_offset_deg != 0.0 {
            local = self.yaw * local;
        }
        local + Vector3::from(self.config.translation)
    }

    /// Local frame to geodetic
    pub fn to_geodetic(&self, local: &Vector3<f64>) -> Geodetic {
        let mut enu = local - Vector3::from(self.config.translation);
        if self.config.yaw_offset_deg != 0.0 {
            enu = self.yaw.inverse() * enu;
        }
        ecef_to_geodetic(&self.enu_to_ecef(&enu))
    }

    /// [`to_local`](Self::to_local) narrowed to f32 at the boundary
    pub fn to_local_f32(&self, lat: f64, lon: f64, alt: f64) -> Vector3<f32> {
        self.to_local(lat, lon, alt).cast::<f32>()
    }

    /// [`to_geodetic`](Self::to_geodetic) from an f32 engine position
    pub fn to_geodetic_f32(&self, local: &Vector3<f32>) -> Geodetic {
        self.to_geodetic(&local.cast::<f64>())
    }

    /// Local heading to geodetic heading (degrees, normalized to (-180, 180])
    pub fn convert_yaw_forward(&self, yaw_deg: f64) -> f64 {
        normalize_angle_deg(yaw_deg - self.config.yaw_offset_deg)
    }

    /// Geodetic heading to local heading
    pub fn convert_yaw_backward(&self, yaw_deg: f64) -> f64 {
        normalize_angle_deg(yaw_deg + self.config.yaw_offset_deg)
    }

    /// Rotate a local direction into the ENU frame
    pub fn convert_dir_forward(&self, dir: &Vector3<f64>) -> Vector3<f64> {
        self.yaw.inverse() * dir
    }

    /// Rotate an ENU direction into the local frame
    pub fn convert_dir_backward(&self, dir: &Vector3<f64>) -> Vector3<f64> {
        self.yaw * dir
    }

    pub fn ecef_to_enu(&self, ecef: &Vector3<f64>) -> Vector3<f64> {
        let d = ecef - self.origin_ecef;
        Vector3::new(
            -self.sin_lon * d.x + self.cos_lon * d.y,
            -self.cos_lon * self.sin_lat * d.x - self.sin_lat * self.sin_lon * d.y
                + self.cos_lat * d.z,
            self.cos_lat * self.cos_lon * d.x + self.cos_lat * self.sin_lon * d.y
                + self.sin_lat * d.z,
        )
    }

    pub fn enu_to_ecef(&self, enu: &Vector3<f64>) -> Vector3<f64> {
        let (e, n, u) = (enu.x, enu.y, enu.z);
        let d = Vector3::new(
            -self.sin_lon * e - self.cos_lon * self.sin_lat * n + self.cos_lat * self.cos_lon * u,
            self.cos_lon * e - self.sin_lat * self.sin_lon * n + self.cos_lat * self.sin_lon * u,
            self.cos_lat * n + self.sin_lat * u,
        );
        d + self.origin_ecef
    }
}

impl Default for GeoReference {
    fn default() -> Self {
        Self::new(GeoReferenceConfig::default())
    }
}

/// Geodetic to Earth-centred Earth-fixed coordinates
pub fn geodetic_to_ecef(geo: &Geodetic) -> Vector3<f64> {
    let lat = geo.lat.to_radians();
    let lon = geo.lon.to_radians();
    let s = lat.sin();
    let n = WGS84_A / (1.0 - WGS84_E_SQ * s * s).sqrt();
    Vector3::new(
        (geo.alt + n) * lat.cos() * lon.cos(),
        (geo.alt + n) * lat.cos() * lon.sin(),
        (geo.alt + (1.0 - WGS84_E_SQ) * n) * s,
    )
}

/// ECEF to geodetic using Bowring's closed-form approximation
pub fn ecef_to_geodetic(ecef: &Vector3<f64>) -> Geodetic {
    let eps = WGS84_E_SQ / (1.0 - WGS84_E_SQ);
    let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
    let q = (ecef.z * WGS84_A).atan2(p * WGS84_B);
    let (sin_q, cos_q) = q.sin_cos();
    let phi = (ecef.z + eps * WGS84_B * sin_q.powi(3))
        .atan2(p - WGS84_E_SQ * WGS84_A * cos_q.powi(3));
    let lambda = ecef.y.atan2(ecef.x);
    let v = WGS84_A / (1.0 - WGS84_E_SQ * phi.sin() * phi.sin()).sqrt();
    Geodetic {
        lat: phi.to_degrees(),
        lon: lambda.to_degrees(),
        alt: p / phi.cos() - v,
    }
}

/// Normalize an angle to (-180, 180]
pub fn normalize_angle_deg(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_origin_maps_to_translation() {
        let geo = GeoReference::new(
            GeoReferenceConfig::default()
                .with_origin(59.995, 30.13, 10.0)
                .with_translation(5.0, -3.0, 1.0),
        );
        let local = geo.to_local(59.995, 30.13, 10.0);
        assert_abs_diff_eq!(local.x, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(local.y, -3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(local.z, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_geodetic_roundtrip() {
        let geo = GeoReference::new(
            GeoReferenceConfig::default()
                .with_origin(59.99, 30.12, 0.0)
                .with_yaw_offset(15.0)
                .with_translation(100.0, -50.0, 2.0),
        );
        let local = geo.to_local(59.995, 30.13, 10.0);
        let back = geo.to_geodetic(&local);
        assert_abs_diff_eq!(back.lat, 59.995, epsilon = 1e-6);
        assert_abs_diff_eq!(back.lon, 30.13, epsilon = 1e-6);
        assert_abs_diff_eq!(back.alt, 10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_north_is_positive_y() {
        let geo = GeoReference::new(GeoReferenceConfig::default().with_origin(45.0, 10.0, 0.0));
        let north = geo.to_local(45.001, 10.0, 0.0);
        assert!(north.y > 100.0);
        assert_abs_diff_eq!(north.x, 0.0, epsilon = 1e-3);

        let east = geo.to_local(45.0, 10.001, 0.0);
        assert!(east.x > 70.0);
        assert_abs_diff_eq!(east.y, 0.0, epsilon = 1e-2);
    }

    #[test]
    fn test_yaw_offset_rotates_frame() {
        let geo = GeoReference::new(
            GeoReferenceConfig::default()
                .with_origin(45.0, 10.0, 0.0)
                .with_yaw_offset(90.0),
        );
        // East in ENU becomes +y after a 90 degree turn
        let east = geo.to_local(45.0, 10.001, 0.0);
        assert!(east.y > 70.0);
        assert_abs_diff_eq!(east.x, 0.0, epsilon = 1e-2);

        let dir = geo.convert_dir_forward(&Vector3::new(0.0, 1.0, 0.0));
        assert_abs_diff_eq!(dir.x, 1.0, epsilon = 1e-12);
        let back = geo.convert_dir_backward(&dir);
        assert_abs_diff_eq!(back.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_yaw_conversion_normalizes() {
        let geo = GeoReference::new(GeoReferenceConfig::default().with_yaw_offset(30.0));
        assert_abs_diff_eq!(geo.convert_yaw_forward(-170.0), 160.0, epsilon = 1e-12);
        assert_abs_diff_eq!(geo.convert_yaw_backward(160.0), -170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_angle_deg(540.0), 180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_angle_deg(-180.0), 180.0, epsilon = 1e-12);
    }

    #[test]
    fn test_f32_boundary() {
        let geo = GeoReference::new(GeoReferenceConfig::default().with_origin(59.995, 30.13, 0.0));
        let local = geo.to_local_f32(59.996, 30.131, 5.0);
        let back = geo.to_geodetic_f32(&local);
        // f32 positions near the origin still resolve to centimetres
        assert_abs_diff_eq!(back.lat, 59.996, epsilon = 1e-6);
        assert_abs_diff_eq!(back.alt, 5.0, epsilon = 0.05);
    }
}
