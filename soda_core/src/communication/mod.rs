//! Hand-off of finished readings to external transports

pub mod channel;
pub mod traits;

pub use channel::{ChannelPublisher, NullPublisher};
pub use traits::{LogSummary, Publisher};
