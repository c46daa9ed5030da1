use crate::batch::BatcherConfig;
use crate::error::Result;
use crate::segment::DetectorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub batcher: BatcherConfig,
    pub engine: EngineConfig,
}

/// Inference engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the model file, when a real engine is in use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<PathBuf>,
    /// Inference threads (None = auto-detect).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file is
    /// missing. Invalid TOML still fails.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(crate::error::BatchscribeError::Io(e))
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - BATCHSCRIBE_MODEL → engine.model
    /// - BATCHSCRIBE_BATCH_SIZE → batcher.batch_size
    /// - BATCHSCRIBE_DYNAMIC_TIME_AXIS → batcher.use_dynamic_time_axis
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("BATCHSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.engine.model = Some(PathBuf::from(model));
        }

        if let Ok(size) = std::env::var("BATCHSCRIBE_BATCH_SIZE")
            && let Ok(size) = size.parse::<usize>()
        {
            self.batcher.batch_size = size;
        }

        if let Ok(flag) = std::env::var("BATCHSCRIBE_DYNAMIC_TIME_AXIS") {
            self.batcher.use_dynamic_time_axis = flag == "1" || flag.eq_ignore_ascii_case("true");
        }

        self
    }

    /// Validates all sections, rejecting degenerate values before any
    /// stream work begins.
    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        self.batcher.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batcher.batch_size, crate::defaults::BATCH_SIZE);
        assert!(config.engine.model.is_none());
    }

    #[test]
    fn test_load_parses_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[detector]\nmax_seg_len = 15.0\n\n[batcher]\nbatch_size = 4\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.detector.max_seg_len, 15.0);
        assert_eq!(config.batcher.batch_size, 4);
        // Unspecified fields keep defaults.
        assert_eq!(config.detector.frame_size, crate::defaults::FRAME_SIZE);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not = valid = toml").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_propagates_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batcher = 12").unwrap();

        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_sections() {
        let mut config = Config::default();
        config.detector.max_seg_len = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.batcher.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed, config);
    }
}
