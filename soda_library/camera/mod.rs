//! # Camera
//!
//! - **fisheye**: polynomial fisheye projection and per-pixel ray tables
//! - **projection_cache**: ray tables persisted with bincode
//! - **frame_codec**: BGRA8 captures to the published pixel formats
//! - **processor**: encodes each frame on a worker and publishes it

pub mod fisheye;
pub mod frame_codec;
pub mod processor;
pub mod projection_cache;

pub use fisheye::{FisheyeIntrinsics, FisheyeProjectionModel, PixelRay, PixelRayMap};
pub use frame_codec::{
    decode_rgba_to_unit_float, DataType, EncodedBuffer, FrameCodec, PixelFormat, SensorFrame,
    DEFAULT_MAX_DEPTH_DISTANCE,
};
pub use processor::{CameraConfig, CameraProcessor};
pub use projection_cache::{CacheKey, ProjectionCache};
