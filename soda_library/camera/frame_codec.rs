//! Raw BGRA8 frame to sensor output encoding
//!
//! Rendered frames arrive as 8-bit B, G, R, A pixels in memory order with a
//! row stride given in pixels. Depth shaders pack a normalized float across
//! all four channels; [`decode_rgba_to_unit_float`] reverses that packing.

use bytemuck::cast_slice;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use soda_core::core::SensorHeader;
use soda_core::error::{SodaError, SodaResult};

/// Default far plane for absolute depth output (metres)
pub const DEFAULT_MAX_DEPTH_DISTANCE: f32 = 200.0;

/// Bytes per input pixel
pub const BGRA_BYTES: usize = 4;

/// Element type of an encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    U8,
    U16,
    F32,
}

impl DataType {
    pub fn size(self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::U16 => 2,
            DataType::F32 => 4,
        }
    }
}

/// Output encoding declared by a camera-family sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PixelFormat {
    /// B, G, R copied from the input
    #[default]
    ColorBgr8 = 0,
    /// Normalized depth scaled to 0..=255
    Depth8 = 2,
    /// Absolute depth in metres
    DepthFloat32 = 3,
    /// Normalized depth scaled to 0..=65535
    Depth16 = 4,
    /// Segmentation colours, B, G, R
    SegmBgr8 = 5,
    /// Segmentation id taken from the red channel
    Segm8 = 6,
    HdrRgb8 = 7,
    /// Colour filter array output, three channels
    Cfa = 8,
}

impl PixelFormat {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PixelFormat::ColorBgr8),
            2 => Some(PixelFormat::Depth8),
            3 => Some(PixelFormat::DepthFloat32),
            4 => Some(PixelFormat::Depth16),
            5 => Some(PixelFormat::SegmBgr8),
            6 => Some(PixelFormat::Segm8),
            7 => Some(PixelFormat::HdrRgb8),
            8 => Some(PixelFormat::Cfa),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn data_type(self) -> DataType {
        match self {
            PixelFormat::DepthFloat32 => DataType::F32,
            PixelFormat::Depth16 => DataType::U16,
            _ => DataType::U8,
        }
    }

    pub fn channels(self) -> usize {
        match self {
            PixelFormat::ColorBgr8
            | PixelFormat::SegmBgr8
            | PixelFormat::HdrRgb8
            | PixelFormat::Cfa => 3,
            PixelFormat::Depth8
            | PixelFormat::Segm8
            | PixelFormat::DepthFloat32
            | PixelFormat::Depth16 => 1,
        }
    }

    /// Size in bytes of an encoded `width` x `height` image
    pub fn raw_buffer_size(self, width: u32, height: u32) -> usize {
        self.data_type().size() * self.channels() * width as usize * height as usize
    }
}

/// Reconstruct the normalized float packed across a BGRA8 pixel.
///
/// R carries the coarse part, G, B and A successively finer residuals.
#[inline]
pub fn decode_rgba_to_unit_float(b: u8, g: u8, r: u8, a: u8) -> f32 {
    ((b as f64 / 65025.0 + g as f64 / 255.0 + r as f64 + a as f64 / 16581375.0) / 255.0) as f32
}

#[inline]
fn decode_at(row: &[u8], x: usize) -> f32 {
    let p = &row[x * BGRA_BYTES..x * BGRA_BYTES + BGRA_BYTES];
    decode_rgba_to_unit_float(p[0], p[1], p[2], p[3])
}

/// A captured frame as handed over by the renderer
#[derive(Debug, Clone, Default)]
pub struct SensorFrame {
    pub header: SensorHeader,
    pub width: u32,
    pub height: u32,
    /// Row stride in pixels (>= width)
    pub stride: u32,
    /// Encoding the sensor publishes this frame in
    pub format: PixelFormat,
    /// BGRA8 pixels, `stride * height * 4` bytes
    pub pixels: Vec<u8>,
}

impl SensorFrame {
    /// Copy a rendered buffer into this frame, reusing its allocation
    pub fn fill(
        &mut self,
        header: SensorHeader,
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        bgra: &[u8],
    ) {
        self.header = header;
        self.width = width;
        self.height = height;
        self.stride = stride;
        self.format = format;
        self.pixels.clear();
        self.pixels.extend_from_slice(bgra);
    }

    pub fn validate(&self) -> SodaResult<()> {
        validate_input(&self.pixels, self.width, self.height, self.stride)
    }

    /// Row `y` of the frame, `width` pixels long
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride as usize * BGRA_BYTES;
        &self.pixels[start..start + self.width as usize * BGRA_BYTES]
    }

    /// Decode the whole frame as a packed depth map, reusing `out`
    pub fn decode_depth_map(&self, out: &mut Vec<f32>) -> SodaResult<()> {
        self.validate()?;
        let w = self.width as usize;
        out.clear();
        out.resize(w * self.height as usize, 0.0);
        if w == 0 {
            return Ok(());
        }
        out.par_chunks_mut(w).enumerate().for_each(|(y, dst)| {
            let row = self.row(y as u32);
            for (x, d) in dst.iter_mut().enumerate() {
                *d = decode_at(row, x);
            }
        });
        Ok(())
    }
}

fn validate_input(pixels: &[u8], width: u32, height: u32, stride: u32) -> SodaResult<()> {
    if stride < width {
        return Err(SodaError::InvalidFrame(format!(
            "stride {} is smaller than width {}",
            stride, width
        )));
    }
    let needed = stride as usize * height as usize * BGRA_BYTES;
    if pixels.len() < needed {
        return Err(SodaError::InvalidFrame(format!(
            "buffer holds {} bytes, {}x{} with stride {} needs {}",
            pixels.len(),
            width,
            height,
            stride,
            needed
        )));
    }
    Ok(())
}

/// Encoded image storage, typed by [`DataType`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EncodedBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl Default for EncodedBuffer {
    fn default() -> Self {
        EncodedBuffer::U8(Vec::new())
    }
}

impl EncodedBuffer {
    /// Raw bytes in native endianness
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            EncodedBuffer::U8(v) => v,
            EncodedBuffer::U16(v) => cast_slice(v),
            EncodedBuffer::F32(v) => cast_slice(v),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            EncodedBuffer::U8(_) => DataType::U8,
            EncodedBuffer::U16(_) => DataType::U16,
            EncodedBuffer::F32(_) => DataType::F32,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.as_bytes().len()
    }
}

/// Pixel-format conversion for camera-family sensors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameCodec {
    /// Scale applied to decoded depth for [`PixelFormat::DepthFloat32`] (metres)
    pub max_depth_distance: f32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            max_depth_distance: DEFAULT_MAX_DEPTH_DISTANCE,
        }
    }
}

impl FrameCodec {
    pub fn new(max_depth_distance: f32) -> Self {
        Self { max_depth_distance }
    }

    /// Encode a BGRA8 buffer into a fresh output buffer
    pub fn encode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> SodaResult<EncodedBuffer> {
        let mut out = EncodedBuffer::default();
        self.encode_into(pixels, width, height, stride, format, &mut out)?;
        Ok(out)
    }

    /// Encode a captured frame
    pub fn encode_frame(&self, frame: &SensorFrame, out: &mut EncodedBuffer) -> SodaResult<()> {
        self.encode_into(
            &frame.pixels,
            frame.width,
            frame.height,
            frame.stride,
            frame.format,
            out,
        )
    }

    /// Encode into `out`, reusing its allocation when the element type matches
    pub fn encode_into(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        out: &mut EncodedBuffer,
    ) -> SodaResult<()> {
        validate_input(pixels, width, height, stride)?;
        let w = width as usize;
        let h = height as usize;
        let row_in = stride as usize * BGRA_BYTES;
        let channels = format.channels();
        let elems = w * h * channels;

        if w == 0 || h == 0 {
            *out = empty_for(format.data_type());
            return Ok(());
        }

        match format.data_type() {
            DataType::U8 => {
                let dst = reuse_u8(out, elems);
                let row_out = w * channels;
                dst.par_chunks_mut(row_out).enumerate().for_each(|(y, dst_row)| {
                    let src = &pixels[y * row_in..y * row_in + w * BGRA_BYTES];
                    match format {
                        PixelFormat::Segm8 => {
                            for (x, d) in dst_row.iter_mut().enumerate() {
                                *d = src[x * BGRA_BYTES + 2];
                            }
                        }
                        PixelFormat::Depth8 => {
                            for (x, d) in dst_row.iter_mut().enumerate() {
                                *d = (decode_at(src, x) * 255.0 + 0.5) as u8;
                            }
                        }
                        _ => {
                            for (px, d) in src.chunks_exact(BGRA_BYTES).zip(dst_row.chunks_exact_mut(3)) {
                                d.copy_from_slice(&px[..3]);
                            }
                        }
                    }
                });
            }
            DataType::U16 => {
                let dst = reuse_u16(out, elems);
                dst.par_chunks_mut(w).enumerate().for_each(|(y, dst_row)| {
                    let src = &pixels[y * row_in..y * row_in + w * BGRA_BYTES];
                    for (x, d) in dst_row.iter_mut().enumerate() {
                        *d = (decode_at(src, x) * 65535.0 + 0.5) as u16;
                    }
                });
            }
            DataType::F32 => {
                let scale = self.max_depth_distance;
                let dst = reuse_f32(out, elems);
                dst.par_chunks_mut(w).enumerate().for_each(|(y, dst_row)| {
                    let src = &pixels[y * row_in..y * row_in + w * BGRA_BYTES];
                    for (x, d) in dst_row.iter_mut().enumerate() {
                        *d = decode_at(src, x) * scale;
                    }
                });
            }
        }
        Ok(())
    }
}

fn empty_for(data_type: DataType) -> EncodedBuffer {
    match data_type {
        DataType::U8 => EncodedBuffer::U8(Vec::new()),
        DataType::U16 => EncodedBuffer::U16(Vec::new()),
        DataType::F32 => EncodedBuffer::F32(Vec::new()),
    }
}

fn reuse_u8(out: &mut EncodedBuffer, len: usize) -> &mut Vec<u8> {
    if !matches!(out, EncodedBuffer::U8(_)) {
        *out = EncodedBuffer::U8(Vec::new());
    }
    match out {
        EncodedBuffer::U8(v) => {
            v.resize(len, 0);
            v
        }
        _ => unreachable!(),
    }
}

fn reuse_u16(out: &mut EncodedBuffer, len: usize) -> &mut Vec<u16> {
    if !matches!(out, EncodedBuffer::U16(_)) {
        *out = EncodedBuffer::U16(Vec::new());
    }
    match out {
        EncodedBuffer::U16(v) => {
            v.resize(len, 0);
            v
        }
        _ => unreachable!(),
    }
}

fn reuse_f32(out: &mut EncodedBuffer, len: usize) -> &mut Vec<f32> {
    if !matches!(out, EncodedBuffer::F32(_)) {
        *out = EncodedBuffer::F32(Vec::new());
    }
    match out {
        EncodedBuffer::F32(v) => {
            v.resize(len, 0.0);
            v
        }
        _ => unreachable!(),
    }
}
