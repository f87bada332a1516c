//! Sensor Hot-Path Benchmarks
//!
//! - Frame codec: BGRA8 capture to each published depth encoding
//! - Fisheye: per-pixel Newton inverse and full ray-table builds
//! - Lidar: depth sampling of a full sweep per interpolation policy
//!
//! Run with: cargo bench --bench sensor_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::Vector3;
use std::time::Duration;

use soda_library::camera::{EncodedBuffer, FisheyeIntrinsics, FisheyeProjectionModel, FrameCodec, PixelFormat};
use soda_library::lidar::{build_projection_map, sample_depth, Interpolation, LidarDepthConfig};

/// Capture resolutions to encode
const RESOLUTIONS: &[(u32, u32)] = &[(640, 480), (1920, 1208)];

fn create_frame(width: u32, height: u32) -> Vec<u8> {
    (0..width as usize * height as usize * 4)
        .map(|i| (i.wrapping_mul(31) & 0xFF) as u8)
        .collect()
}

fn bench_depth_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_codec_depth");
    group.measurement_time(Duration::from_secs(5));
    let codec = FrameCodec::default();

    for &(w, h) in RESOLUTIONS {
        let pixels = create_frame(w, h);
        group.throughput(Throughput::Elements(w as u64 * h as u64));
        for format in [PixelFormat::Depth8, PixelFormat::Depth16, PixelFormat::DepthFloat32] {
            let id = BenchmarkId::new(format!("{:?}", format), format!("{}x{}", w, h));
            group.bench_with_input(id, &pixels, |b, pixels| {
                let mut out = EncodedBuffer::default();
                b.iter(|| {
                    codec
                        .encode_into(black_box(pixels), w, h, w, format, &mut out)
                        .unwrap();
                    black_box(out.byte_len());
                });
            });
        }
    }

    group.finish();
}

fn fisheye() -> FisheyeProjectionModel {
    FisheyeProjectionModel::new(
        FisheyeIntrinsics::new(320.0, 320.0, 640.0, 400.0).with_distortion(-0.013, 0.0021, -0.0004, 0.00002),
    )
    .unwrap()
}

fn bench_fisheye_inverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("fisheye_inverse");
    let model = fisheye();

    group.bench_function("single_pixel", |b| {
        b.iter(|| black_box(model.project_pixel_to_ray(black_box(900.0), black_box(610.0))));
    });

    group.sample_size(10);
    group.bench_function("ray_map_1280x800", |b| {
        b.iter(|| black_box(model.build_pixel_ray_map(1280, 800)));
    });

    group.finish();
}

fn bench_lidar_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("lidar_sampling");
    let config = LidarDepthConfig::default();
    let rays: Vec<Vector3<f32>> = config.rays();
    let map = build_projection_map(&rays, config.camera_fov, config.texture_width, config.texture_height).unwrap();
    let depth: Vec<f32> = (0..map.width as usize * map.height as usize)
        .map(|i| (i % 997) as f32 / 997.0)
        .collect();

    group.throughput(Throughput::Elements(rays.len() as u64));
    for interpolation in [Interpolation::Nearest, Interpolation::Bilinear, Interpolation::Min] {
        group.bench_function(format!("{:?}", interpolation), |b| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for k in 0..map.len() {
                    if let Some(d) = sample_depth(&map, &depth, k, interpolation) {
                        sum += d;
                    }
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_depth_encoding, bench_fisheye_inverse, bench_lidar_sampling);
criterion_main!(benches);
