//! Runtime parameter store for SODA sensors
//!
//! A flat key-value store backed by `serde_json::Value`. Whole sensor
//! configuration structs can be stored under a single key and read back
//! with [`RuntimeParams::get`], so a vehicle description file can carry
//! every sensor's settings in one place.

use crate::error::{SodaError, SodaResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsFormat {
    Yaml,
    Toml,
    Json,
}

impl ParamsFormat {
    /// Detect the format from a path extension
    pub fn from_path(path: &Path) -> SodaResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(ParamsFormat::Yaml),
            Some("toml") => Ok(ParamsFormat::Toml),
            Some("json") => Ok(ParamsFormat::Json),
            other => Err(SodaError::Config(format!(
                "unsupported params file extension {:?} for {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Shared runtime parameter store
#[derive(Clone)]
pub struct RuntimeParams {
    /// Parameter storage - BTreeMap keeps keys sorted for stable output
    params: Arc<RwLock<BTreeMap<String, Value>>>,
    /// Optional persistence path
    persist_path: Option<PathBuf>,
}

impl RuntimeParams {
    /// Create a store pre-filled with pipeline defaults
    pub fn new() -> Self {
        let store = Self::empty();
        store.set_defaults();
        store
    }

    /// Create a store with no entries
    pub fn empty() -> Self {
        Self {
            params: Arc::new(RwLock::new(BTreeMap::new())),
            persist_path: None,
        }
    }

    /// Load a store from a YAML, TOML or JSON file
    ///
    /// Loaded entries override the defaults. The path is remembered for
    /// [`RuntimeParams::save`].
    pub fn from_file(path: impl AsRef<Path>) -> SodaResult<Self> {
        let path = path.as_ref();
        let mut store = Self::new();
        store.load_from_disk(path)?;
        store.persist_path = Some(path.to_path_buf());
        Ok(store)
    }

    fn set_defaults(&self) {
        let mut params = self.params.write();
        params.insert("pipeline.worker_threads".into(), Value::from(0));
        params.insert("pipeline.skip_warn_every".into(), Value::from(100));
        params.insert("camera.max_depth_distance".into(), Value::from(200.0));
        params.insert("radar.period".into(), Value::from(0.07));
        params.insert("radar.max_dist_diff".into(), Value::from(1.0));
        params.insert("radar.objects_max_num".into(), Value::from(50));
        params.insert("ultrasonic.echos_max_num".into(), Value::from(3));
    }

    /// Get a parameter value, deserialized into `T`
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let params = self.params.read();
        let value = params.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Get a parameter or fail with [`SodaError::ParamNotFound`]
    pub fn require<T: for<'de> Deserialize<'de>>(&self, key: &str) -> SodaResult<T> {
        let value = self
            .params
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| SodaError::ParamNotFound(key.to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Get parameter with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.get_or(key, default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.get_or(key, default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_or(key, default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get_or(key, default.to_string())
    }

    /// Set a parameter value
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> SodaResult<()> {
        let json_value = serde_json::to_value(value)?;
        self.params.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// List all parameter keys
    pub fn list_keys(&self) -> Vec<String> {
        self.params.read().keys().cloned().collect()
    }

    /// Check if a parameter exists
    pub fn has(&self, key: &str) -> bool {
        self.params.read().contains_key(key)
    }

    /// Remove a parameter
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.params.write().remove(key)
    }

    /// Merge entries from a file into the store
    pub fn load_from_disk(&self, path: &Path) -> SodaResult<()> {
        let text = std::fs::read_to_string(path)?;
        let loaded: BTreeMap<String, Value> = match ParamsFormat::from_path(path)? {
            ParamsFormat::Yaml => serde_yaml::from_str(&text)?,
            ParamsFormat::Toml => toml::from_str(&text)?,
            ParamsFormat::Json => serde_json::from_str(&text)?,
        };
        tracing::debug!("Loaded {} params from {}", loaded.len(), path.display());
        self.params.write().extend(loaded);
        Ok(())
    }

    /// Write the store back to the path it was loaded from
    pub fn save(&self) -> SodaResult<()> {
        let path = self
            .persist_path
            .clone()
            .ok_or_else(|| SodaError::Config("params store has no persistence path".into()))?;
        self.save_to_disk(&path)
    }

    /// Write the store to a file, format chosen by extension
    pub fn save_to_disk(&self, path: &Path) -> SodaResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let params = self.params.read();
        let text = match ParamsFormat::from_path(path)? {
            ParamsFormat::Yaml => serde_yaml::to_string(&*params)?,
            ParamsFormat::Toml => toml::to_string(&*params)?,
            ParamsFormat::Json => serde_json::to_string_pretty(&*params)?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuntimeParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeParams")
            .field("keys", &self.list_keys())
            .field("persist_path", &self.persist_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Mount {
        x: f32,
        y: f32,
        enabled: bool,
    }

    #[test]
    fn test_basic_operations() {
        let params = RuntimeParams::new();

        assert_eq!(params.get_f64("radar.period", 0.0), 0.07);
        assert_eq!(params.get_usize("radar.objects_max_num", 0), 50);

        params.set("test_value", 42.5).unwrap();
        assert_eq!(params.get::<f64>("test_value"), Some(42.5));

        params.set("radar.period", 0.05).unwrap();
        assert_eq!(params.get_f64("radar.period", 0.0), 0.05);
    }

    #[test]
    fn test_struct_roundtrip_through_store() {
        let params = RuntimeParams::empty();
        let mount = Mount {
            x: 1.5,
            y: -0.25,
            enabled: true,
        };
        params.set("mount", &mount).unwrap();
        assert_eq!(params.get::<Mount>("mount"), Some(mount));
    }

    #[test]
    fn test_require_missing() {
        let params = RuntimeParams::empty();
        let err = params.require::<f64>("nope").unwrap_err();
        assert!(matches!(err, SodaError::ParamNotFound(ref k) if k == "nope"));
    }

    #[test]
    fn test_yaml_and_toml_files() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("vehicle.yaml");
        std::fs::write(&yaml_path, "camera.max_depth_distance: 150.0\nname: test\n").unwrap();
        let params = RuntimeParams::from_file(&yaml_path).unwrap();
        assert_eq!(params.get_f64("camera.max_depth_distance", 0.0), 150.0);
        assert_eq!(params.get_string("name", ""), "test");
        // defaults survive a partial file
        assert_eq!(params.get_usize("ultrasonic.echos_max_num", 0), 3);

        let toml_path = dir.path().join("out.toml");
        params.save_to_disk(&toml_path).unwrap();
        let reloaded = RuntimeParams::from_file(&toml_path).unwrap();
        assert_eq!(reloaded.get_string("name", ""), "test");
    }

    #[test]
    fn test_unknown_extension() {
        let err = ParamsFormat::from_path(Path::new("params.ini")).unwrap_err();
        assert!(matches!(err, SodaError::Config(_)));
    }
}
