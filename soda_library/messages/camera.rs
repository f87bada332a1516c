use crate::camera::frame_codec::{EncodedBuffer, PixelFormat};
use serde::{Deserialize, Serialize};
use soda_core::communication::LogSummary;
use soda_core::core::SensorHeader;

/// Encoded frame of a camera-family sensor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraImage {
    pub header: SensorHeader,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: EncodedBuffer,
}

impl CameraImage {
    /// Raw bytes of the encoded image
    pub fn bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }
}

impl LogSummary for CameraImage {
    fn log_summary(&self) -> String {
        format!(
            "CameraImage[{}#{}] {}x{} {:?} ({} bytes)",
            self.header.sensor,
            self.header.frame_index,
            self.width,
            self.height,
            self.format,
            self.data.byte_len()
        )
    }
}
