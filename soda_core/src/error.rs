//! Error types shared by every SODA crate

use thiserror::Error;

/// Errors surfaced by the sensor pipeline.
///
/// Only activation-time problems and infrastructure failures end up here.
/// Per-ray and per-frame problems are recovered where they happen and are
/// counted instead of returned.
#[derive(Debug, Error)]
pub enum SodaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid camera intrinsics: {0}")]
    InvalidIntrinsics(String),

    #[error("Sensor '{0}' has an empty ray set")]
    EmptyRaySet(String),

    #[error("Sensor '{sensor}' cannot activate: {reason}")]
    Activation { sensor: String, reason: String },

    #[error("Pipeline '{0}' is finished and accepts no new frames")]
    PipelineFinished(String),

    #[error("Worker pool is stopped")]
    PoolStopped,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Parameter '{0}' not found")]
    ParamNotFound(String),

    #[error("Projection cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl SodaError {
    /// Shorthand for an activation failure of a named sensor
    pub fn activation(sensor: impl Into<String>, reason: impl Into<String>) -> Self {
        SodaError::Activation {
            sensor: sensor.into(),
            reason: reason.into(),
        }
    }

    /// True for errors the owner should treat as "cannot activate"
    pub fn is_activation_error(&self) -> bool {
        matches!(
            self,
            SodaError::Activation { .. }
                | SodaError::InvalidIntrinsics(_)
                | SodaError::EmptyRaySet(_)
                | SodaError::Config(_)
        )
    }
}

/// Result type for SODA operations
pub type SodaResult<T> = Result<T, SodaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_display() {
        let err = SodaError::activation("radar_front", "no beams");
        assert_eq!(
            err.to_string(),
            "Sensor 'radar_front' cannot activate: no beams"
        );
        assert!(err.is_activation_error());
    }

    #[test]
    fn test_io_conversion() {
        fn open() -> SodaResult<()> {
            std::fs::read("/definitely/not/here")?;
            Ok(())
        }
        let err = open().unwrap_err();
        assert!(matches!(err, SodaError::Io(_)));
        assert!(!err.is_activation_error());
    }
}
