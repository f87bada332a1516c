//! # Lidar
//!
//! A depth camera renders the scene and each lidar ray reads its range from
//! the texture at a precomputed texel position.

pub mod processor;
pub mod projector;
pub mod rays;

pub use processor::LidarDepthProcessor;
pub use projector::{build_projection_map, sample_depth, ProjectionMap, SampledRayProjector, UvEntry};
pub use rays::{scale_for_planar_depth, Interpolation, LidarDepthConfig};
