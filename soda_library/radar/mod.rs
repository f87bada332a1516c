//! # Radar
//!
//! - **params**: band envelopes, beam enumeration and the RCS table
//! - **hit**: detection filters turning raycast results into [`RadarHit`]s
//! - **cluster**: cluster mode, hits grouped by range within one scan
//! - **object**: object mode, entities tracked across scans
//! - **processor**: the [`SensorProcessor`](soda_core::scheduling::SensorProcessor)
//!   running one scan per frame

pub mod cluster;
pub mod hit;
pub mod object;
pub mod params;
pub mod processor;

pub use cluster::{RadarCluster, RadarClusterEngine};
pub use hit::{process_hit, RadarHit, RadarView};
pub use object::{LocalBounds, RadarObject, RadarObjectTracker, TrackingState};
pub use params::{RadarBeam, RadarParams, RadarRcsTable};
pub use processor::{RadarConfig, RadarMode, RadarProcessor};
