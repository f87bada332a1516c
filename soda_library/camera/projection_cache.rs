//! On-disk cache of fisheye pixel ray tables
//!
//! Building a ray table runs a Newton solve per pixel, which is noticeable
//! for large sensors. Tables are stored with bincode next to the key they
//! were built from; a key or size mismatch on load counts as a miss.

use super::fisheye::{FisheyeIntrinsics, FisheyeProjectionModel, PixelRayMap};
use serde::{Deserialize, Serialize};
use soda_core::error::{SodaError, SodaResult};
use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Identity of a cached table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    pub intrinsics: FisheyeIntrinsics,
    pub width: u32,
    pub height: u32,
    pub ray_count: usize,
}

impl CacheKey {
    pub fn new(intrinsics: FisheyeIntrinsics, width: u32, height: u32) -> Self {
        Self {
            intrinsics,
            width,
            height,
            ray_count: width as usize * height as usize,
        }
    }

    fn file_name(&self) -> String {
        let mut hasher = DefaultHasher::new();
        let k = &self.intrinsics;
        for v in [k.fx, k.fy, k.cx, k.cy, k.k1, k.k2, k.k3, k.k4] {
            v.to_bits().hash(&mut hasher);
        }
        self.ray_count.hash(&mut hasher);
        format!(
            "fisheye_{}x{}_{:016x}.bin",
            self.width,
            self.height,
            hasher.finish()
        )
    }
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    key: CacheKey,
    map: PixelRayMap,
}

/// Directory-backed projection cache
#[derive(Debug, Clone)]
pub struct ProjectionCache {
    dir: PathBuf,
}

impl ProjectionCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Load a table, `Ok(None)` on a miss
    pub fn load(&self, key: &CacheKey) -> SodaResult<Option<PixelRayMap>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&path)?);
        let file: CacheFile = bincode::deserialize_from(reader)?;
        if file.key != *key {
            tracing::debug!("Projection cache key mismatch in {}", path.display());
            return Ok(None);
        }
        if file.map.rays.len() != key.ray_count
            || file.map.width != key.width
            || file.map.height != key.height
        {
            return Err(SodaError::Cache(format!(
                "{} holds {} rays, expected {}",
                path.display(),
                file.map.rays.len(),
                key.ray_count
            )));
        }
        Ok(Some(file.map))
    }

    pub fn store(&self, key: &CacheKey, map: &PixelRayMap) -> SodaResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let writer = BufWriter::new(File::create(&path)?);
        bincode::serialize_into(
            writer,
            &CacheFile {
                key: *key,
                map: map.clone(),
            },
        )?;
        tracing::debug!("Stored projection cache {}", path.display());
        Ok(())
    }

    /// Return the cached table or build and store a new one.
    ///
    /// Cache I/O problems never fail the caller; they only cost a rebuild.
    pub fn load_or_build(
        &self,
        model: &FisheyeProjectionModel,
        width: u32,
        height: u32,
    ) -> PixelRayMap {
        let key = CacheKey::new(*model.intrinsics(), width, height);
        match self.load(&key) {
            Ok(Some(map)) => return map,
            Ok(None) => tracing::info!(
                "Projection cache miss for {}x{}, building ray table",
                width,
                height
            ),
            Err(e) => tracing::warn!("Projection cache unusable ({}), rebuilding", e),
        }

        let map = model.build_pixel_ray_map(width, height);
        if let Err(e) = self.store(&key, &map) {
            tracing::warn!("Failed to store projection cache: {}", e);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> FisheyeProjectionModel {
        FisheyeProjectionModel::new(
            FisheyeIntrinsics::new(60.0, 60.0, 16.0, 12.0).with_distortion(-0.01, 0.001, 0.0, 0.0),
        )
        .unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProjectionCache::new(dir.path());
        let model = model();
        let key = CacheKey::new(*model.intrinsics(), 32, 24);

        assert!(cache.load(&key).unwrap().is_none());
        let built = cache.load_or_build(&model, 32, 24);
        assert!(cache.path_for(&key).exists());

        let loaded = cache.load(&key).unwrap().unwrap();
        assert_eq!(loaded, built);
    }

    #[test]
    fn test_different_intrinsics_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProjectionCache::new(dir.path());
        let model = model();
        cache.load_or_build(&model, 32, 24);

        let other = CacheKey::new(FisheyeIntrinsics::new(61.0, 60.0, 16.0, 12.0), 32, 24);
        assert!(cache.load(&other).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ProjectionCache::new(dir.path());
        let model = model();
        let key = CacheKey::new(*model.intrinsics(), 8, 8);
        std::fs::write(cache.path_for(&key), b"not a cache").unwrap();

        assert!(cache.load(&key).is_err());
        let map = cache.load_or_build(&model, 8, 8);
        assert_eq!(map.rays.len(), 64);
        assert!(cache.load(&key).unwrap().is_some());
    }
}
