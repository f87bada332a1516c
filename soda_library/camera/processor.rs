//! Camera-family sensor processor

use super::fisheye::{FisheyeIntrinsics, FisheyeProjectionModel, PixelRayMap};
use super::frame_codec::{EncodedBuffer, FrameCodec, PixelFormat, SensorFrame, DEFAULT_MAX_DEPTH_DISTANCE};
use super::projection_cache::ProjectionCache;
use crate::messages::CameraImage;
use crate::publish::SensorPublishAdapter;
use serde::{Deserialize, Serialize};
use soda_core::error::{SodaError, SodaResult};
use soda_core::params::RuntimeParams;
use soda_core::scheduling::SensorProcessor;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Published encoding
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Metres represented by a unit depth sample
    pub max_depth_distance: f32,
    /// Present for fisheye cameras
    pub fisheye: Option<FisheyeIntrinsics>,
    /// Where fisheye ray tables are cached, none to always rebuild
    pub cache_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            format: PixelFormat::default(),
            width: 1280,
            height: 720,
            max_depth_distance: DEFAULT_MAX_DEPTH_DISTANCE,
            fisheye: None,
            cache_dir: None,
        }
    }
}

impl CameraConfig {
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fisheye(mut self, intrinsics: FisheyeIntrinsics) -> Self {
        self.fisheye = Some(intrinsics);
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Override the depth scale from `camera.max_depth_distance`
    pub fn with_params(mut self, params: &RuntimeParams) -> Self {
        self.max_depth_distance = params.get_or("camera.max_depth_distance", self.max_depth_distance);
        self
    }

    pub fn validate(&self, sensor: &str) -> SodaResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SodaError::activation(
                sensor,
                format!("image size {}x{} is empty", self.width, self.height),
            ));
        }
        if !(self.max_depth_distance > 0.0) {
            return Err(SodaError::activation(
                sensor,
                format!("max_depth_distance {} must be positive", self.max_depth_distance),
            ));
        }
        if let Some(intrinsics) = &self.fisheye {
            intrinsics
                .validate()
                .map_err(|e| SodaError::activation(sensor, e.to_string()))?;
        }
        Ok(())
    }
}

/// Encodes captured frames and publishes them as [`CameraImage`]s
pub struct CameraProcessor {
    name: String,
    config: CameraConfig,
    codec: FrameCodec,
    ray_map: Option<PixelRayMap>,
    publisher: SensorPublishAdapter,
    invalid_frames: u64,
}

impl CameraProcessor {
    pub fn new(name: &str, config: CameraConfig, publisher: SensorPublishAdapter) -> SodaResult<Self> {
        config.validate(name)?;

        let ray_map = match &config.fisheye {
            Some(intrinsics) => {
                let model = FisheyeProjectionModel::new(*intrinsics)?;
                let map = match &config.cache_dir {
                    Some(dir) => ProjectionCache::new(dir).load_or_build(&model, config.width, config.height),
                    None => model.build_pixel_ray_map(config.width, config.height),
                };
                Some(map)
            }
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            codec: FrameCodec::new(config.max_depth_distance),
            config,
            ray_map,
            publisher,
            invalid_frames: 0,
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Per-pixel rays of a fisheye camera
    pub fn ray_map(&self) -> Option<&PixelRayMap> {
        self.ray_map.as_ref()
    }

    pub fn invalid_frames(&self) -> u64 {
        self.invalid_frames
    }

    /// Encode one frame in the configured format
    pub fn encode(&self, frame: &SensorFrame) -> SodaResult<CameraImage> {
        if frame.width != self.config.width || frame.height != self.config.height {
            return Err(SodaError::InvalidFrame(format!(
                "frame is {}x{}, camera is {}x{}",
                frame.width, frame.height, self.config.width, self.config.height
            )));
        }
        let mut data = EncodedBuffer::default();
        self.codec.encode_into(
            &frame.pixels,
            frame.width,
            frame.height,
            frame.stride,
            self.config.format,
            &mut data,
        )?;
        Ok(CameraImage {
            header: frame.header.clone(),
            width: frame.width,
            height: frame.height,
            format: self.config.format,
            data,
        })
    }
}

impl SensorProcessor for CameraProcessor {
    type Frame = SensorFrame;

    fn process(&mut self, frame: &mut SensorFrame) {
        match self.encode(frame) {
            Ok(image) => {
                self.publisher.publish(image);
            }
            Err(e) => {
                self.invalid_frames += 1;
                if self.invalid_frames == 1 {
                    tracing::warn!("[{}] dropping frame: {}", self.name, e);
                } else {
                    tracing::debug!("[{}] dropping frame: {}", self.name, e);
                }
            }
        }
    }

    fn on_finish(&mut self) {
        if self.invalid_frames > 0 {
            tracing::warn!("[{}] {} frames could not be encoded", self.name, self.invalid_frames);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SensorReading;
    use soda_core::communication::{ChannelPublisher, NullPublisher};
    use soda_core::core::SensorHeader;
    use std::sync::Arc;

    fn frame(width: u32, height: u32, bgra: [u8; 4]) -> SensorFrame {
        let mut frame = SensorFrame::default();
        let pixels: Vec<u8> = bgra.iter().copied().cycle().take((width * height * 4) as usize).collect();
        frame.fill(
            SensorHeader::new("cam", 3, Default::default()),
            width,
            height,
            width,
            PixelFormat::ColorBgr8,
            &pixels,
        );
        frame
    }

    #[test]
    fn test_encodes_and_publishes() {
        let (tx, rx) = ChannelPublisher::<SensorReading>::unbounded("cam");
        let config = CameraConfig::default()
            .with_size(4, 2)
            .with_format(PixelFormat::Segm8);
        let mut camera = CameraProcessor::new("cam", config, SensorPublishAdapter::new(Arc::new(tx))).unwrap();

        camera.process(&mut frame(4, 2, [1, 2, 9, 255]));
        let SensorReading::Camera(image) = rx.try_recv().unwrap() else {
            panic!("expected a camera image");
        };
        assert_eq!(image.header.frame_index, 3);
        assert_eq!(image.format, PixelFormat::Segm8);
        assert_eq!(image.bytes(), &[9u8; 8][..]);
    }

    #[test]
    fn test_size_mismatch_is_counted() {
        let config = CameraConfig::default().with_size(4, 2);
        let mut camera =
            CameraProcessor::new("cam", config, SensorPublishAdapter::new(Arc::new(NullPublisher))).unwrap();
        camera.process(&mut frame(2, 2, [0; 4]));
        camera.process(&mut frame(4, 2, [0; 4]));
        assert_eq!(camera.invalid_frames(), 1);
    }

    #[test]
    fn test_fisheye_ray_map_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = CameraConfig::default()
            .with_size(16, 12)
            .with_fisheye(FisheyeIntrinsics::new(10.0, 10.0, 8.0, 6.0))
            .with_cache_dir(dir.path());
        let adapter = SensorPublishAdapter::new(Arc::new(NullPublisher));

        let first = CameraProcessor::new("fish", config.clone(), adapter.clone()).unwrap();
        let map = first.ray_map().unwrap();
        assert_eq!(map.rays.len(), 16 * 12);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let second = CameraProcessor::new("fish", config, adapter).unwrap();
        assert_eq!(second.ray_map(), first.ray_map());
    }

    #[test]
    fn test_depth_scale_from_params() {
        let params = RuntimeParams::new();
        params.set("camera.max_depth_distance", 100.0).unwrap();
        let config = CameraConfig::default()
            .with_size(2, 1)
            .with_format(PixelFormat::DepthFloat32)
            .with_params(&params);
        assert_eq!(config.max_depth_distance, 100.0);

        let camera = CameraProcessor::new("depth", config, SensorPublishAdapter::new(Arc::new(NullPublisher))).unwrap();
        // coarse byte 51 is 0.2 of the depth norm
        let image = camera.encode(&frame(2, 1, [0, 0, 51, 0])).unwrap();
        let EncodedBuffer::F32(depths) = &image.data else {
            panic!("expected f32 depth");
        };
        assert!(depths.iter().all(|d| (d - 20.0).abs() < 1e-3));
    }

    #[test]
    fn test_activation_errors() {
        let adapter = SensorPublishAdapter::new(Arc::new(NullPublisher));
        let err = CameraProcessor::new("cam", CameraConfig::default().with_size(0, 10), adapter.clone())
            .err()
            .unwrap();
        assert!(err.is_activation_error());

        let bad_lens = CameraConfig::default().with_fisheye(FisheyeIntrinsics::new(-1.0, 1.0, 0.0, 0.0));
        assert!(CameraProcessor::new("cam", bad_lens, adapter).is_err());
    }
}
