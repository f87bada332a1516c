//! # SODA Sensor Library
//!
//! Sensor models of the SODA vehicle simulator.
//!
//! ## Structure
//!
//! ```text
//! soda_library/
//! ── geo/           # WGS-84 geodetic reference
//! ── scene/         # Raycast results handed in by the physics side
//! ── camera/        # Fisheye projection, frame codec, camera processor
//! ── lidar/         # Depth-texture lidar: ray layout, projector, processor
//! ── radar/         # Beam envelopes, clusters, object tracking
//! ── ultrasonic/    # Echo merging and hub processor
//! ── messages/      # Published readings
//! ── publish.rs     # Processor to transport boundary
//! ── context.rs     # Worker pool, publisher, clock and params bundle
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use soda_library::prelude::*;
//!
//! let (tx, rx) = ChannelPublisher::<SensorReading>::unbounded("sensors");
//! let ctx = SensorPipelineContext::start(RuntimeParams::new(), Arc::new(tx))?;
//!
//! let radar = RadarProcessor::new("front", RadarConfig::default(), ctx.publisher().clone())?;
//! let radar = ctx.spawn("front", radar);
//! radar.submit_frame(|batch, header| batch.fill(header, pose, velocity, &hits))?;
//! ```

pub mod camera;
pub mod context;
pub mod geo;
pub mod lidar;
pub mod messages;
pub mod publish;
pub mod radar;
pub mod scene;
pub mod ultrasonic;

pub use soda_core::communication::LogSummary;

pub use context::{SensorHandle, SensorPipelineContext};
pub use messages::*;
pub use publish::SensorPublishAdapter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::LogSummary;

    pub use crate::camera::{
        CameraConfig, CameraProcessor, FisheyeIntrinsics, FisheyeProjectionModel, FrameCodec,
        PixelFormat, ProjectionCache, SensorFrame,
    };
    pub use crate::context::{SensorHandle, SensorPipelineContext};
    pub use crate::geo::{GeoReference, GeoReferenceConfig, Geodetic};
    pub use crate::lidar::{Interpolation, LidarDepthConfig, LidarDepthProcessor, SampledRayProjector};
    pub use crate::messages::{
        CameraImage, LidarPoint, LidarPointStatus, LidarScan, RadarDetections, RadarScan,
        SensorReading, UltrasonicEchoSet, UltrasonicHubScan,
    };
    pub use crate::publish::SensorPublishAdapter;
    pub use crate::radar::{RadarConfig, RadarMode, RadarParams, RadarProcessor};
    pub use crate::scene::{HitBatch, ObjectCategory, RayHit, RaySegment};
    pub use crate::ultrasonic::{
        UltrasonicFrame, UltrasonicHubConfig, UltrasonicHubProcessor, UltrasonicSensorConfig,
    };
}
