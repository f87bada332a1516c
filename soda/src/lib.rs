//! # SODA - vehicle simulation sensor pipeline
//!
//! SODA turns rendered frames and traced ray batches into structured sensor
//! readings (camera images, lidar point clouds, radar clusters and objects,
//! ultrasonic echoes) on a worker pool, so the render loop never waits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use soda::prelude::*;
//!
//! fn main() -> AnyResult<()> {
//!     soda::logging::init("info");
//!
//!     let (tx, readings) = ChannelPublisher::<SensorReading>::unbounded("sensors");
//!     let ctx = SensorPipelineContext::start(RuntimeParams::new(), Arc::new(tx))?;
//!
//!     let config = RadarConfig::default();
//!     let rays = config.ray_segments(&Isometry3::identity());
//!     let radar = ctx.spawn(
//!         "radar_front",
//!         RadarProcessor::new("radar_front", config, ctx.publisher().clone())?,
//!     );
//!
//!     // every physics tick: trace `rays`, then hand the hits over
//!     let hits: Vec<RayHit> = Vec::with_capacity(rays.len());
//!     radar.submit_frame(|batch, header| {
//!         batch.fill(header, Isometry3::identity(), Vector3::zeros(), &hits)
//!     })?;
//!
//!     radar.finish();
//!     ctx.shutdown();
//!     for reading in readings.try_iter() {
//!         println!("{}", reading.log_summary());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Drop-if-busy double buffering**: at most one frame in flight per sensor
//! - **Deterministic numerics**: fisheye Newton solve, seeded weather, order-invariant clustering
//! - **Explicit dependencies**: pool, publisher, clock and params passed in a context

// Re-export core components
pub use soda_core::{self, *};

// Re-export the sensor library with alias
pub use soda_library as library;

/// The SODA prelude - everything needed to wire sensors into a simulator
pub mod prelude {
    // Pipeline plumbing
    pub use soda_core::communication::{ChannelPublisher, LogSummary, NullPublisher, Publisher};
    pub use soda_core::core::{Clock, ManualClock, SensorHeader, SystemClock};
    pub use soda_core::params::RuntimeParams;
    pub use soda_core::scheduling::{
        AsyncTaskManager, DoubleBufferedTask, PipelineConfig, PipelineState, SensorProcessor,
    };

    // Error types
    pub use soda_core::error::{SodaError, SodaResult};
    pub type Result<T> = SodaResult<T>;

    // Sensors and messages
    pub use soda_library::prelude::*;

    // Math
    pub use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::Duration;

    // Common traits
    pub use serde::{Deserialize, Serialize};

    // Re-export anyhow for application code
    pub use anyhow::{anyhow, bail, ensure, Context, Result as AnyResult};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get SODA version
pub fn version() -> &'static str {
    VERSION
}
