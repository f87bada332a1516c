//! # SODA Core
//!
//! Runtime plumbing for the SODA vehicle-simulation sensor pipeline.
//!
//! The render or physics loop produces raw frames and ray-hit batches; this
//! crate moves them to worker threads without ever stalling that loop, and
//! hands finished readings to an external transport.
//!
//! - **Scheduling**: worker pool plus double-buffered per-sensor tasks
//! - **Communication**: the publisher boundary and in-process sinks
//! - **Params**: key-value runtime configuration loaded from YAML/TOML/JSON
//! - **Core**: clock abstraction and sensor headers
//!
//! ## Quick Start
//!
//! ```rust
//! use soda_core::scheduling::{AsyncTaskManager, DoubleBufferedTask, PipelineConfig, SensorProcessor};
//!
//! #[derive(Default)]
//! struct Frame {
//!     value: u32,
//! }
//!
//! struct Doubler;
//!
//! impl SensorProcessor for Doubler {
//!     type Frame = Frame;
//!
//!     fn process(&mut self, frame: &mut Frame) {
//!         frame.value *= 2;
//!     }
//! }
//!
//! let pool = AsyncTaskManager::start(PipelineConfig::single_threaded()).unwrap();
//! let task = DoubleBufferedTask::new("doubler", Doubler, pool.clone());
//! if let Some(mut front) = task.lock_front().unwrap() {
//!     front.value = 21;
//!     front.submit().unwrap();
//! }
//! task.finish();
//! pool.stop();
//! ```

pub mod communication;
pub mod core;
pub mod error;
pub mod logging;
pub mod params;
pub mod scheduling;

// Re-export commonly used types for easy access
pub use communication::{ChannelPublisher, LogSummary, NullPublisher, Publisher};
pub use core::{Clock, ManualClock, SensorHeader, SystemClock};
pub use error::{SodaError, SodaResult};
pub use params::RuntimeParams;
pub use scheduling::{
    AsyncTaskManager, DoubleBufferedTask, PipelineConfig, PipelineState, SensorProcessor,
};
