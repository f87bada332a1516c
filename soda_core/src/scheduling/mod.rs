//! # Frame-processing scheduling
//!
//! - **AsyncTaskManager**: fixed worker pool woken by triggers
//! - **DoubleBufferedTask**: front/back frame hand-off with drop-if-busy backpressure
//!
//! ## Usage
//!
//! ```rust,ignore
//! use soda_core::scheduling::{AsyncTaskManager, DoubleBufferedTask, PipelineConfig};
//!
//! let pool = AsyncTaskManager::start(PipelineConfig::default())?;
//! let task = DoubleBufferedTask::new("camera_front", processor, pool.clone());
//!
//! // every render tick
//! if let Some(mut front) = task.lock_front()? {
//!     front.pixels.copy_from_slice(&rendered);
//!     front.submit()?;
//! }
//!
//! // on deactivation
//! task.finish();
//! ```

pub mod config;
pub mod double_buffer;
pub mod task_manager;

pub use config::PipelineConfig;
pub use double_buffer::{DoubleBufferedTask, FrontGuard, PipelineState, SensorProcessor};
pub use task_manager::{AsyncTaskManager, PipelineJob};
