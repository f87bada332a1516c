//! # Ultrasonic
//!
//! A hub fires one sensor per tick and every sensor of the hub listens to
//! the same sweep. Direct and cross-sensor reflections are merged into a
//! few echoes per receiver.

pub mod echo;
pub mod hub;

pub use echo::{UltrasonicEcho, UltrasonicEchos, DEFAULT_ECHOS_MAX_NUM};
pub use hub::{UltrasonicFrame, UltrasonicHubConfig, UltrasonicHubProcessor, UltrasonicSensorConfig};
