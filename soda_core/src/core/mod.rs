//! # Core types shared by all sensors
//!
//! - **Clock**: injected source of simulation time
//! - **SensorHeader**: the stamp carried by every frame and reading

pub mod clock;
pub mod header;

pub use clock::{Clock, ManualClock, SystemClock};
pub use header::SensorHeader;
