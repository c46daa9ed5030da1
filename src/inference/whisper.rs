//! Whisper-based inference engine.
//!
//! This module provides a Whisper implementation of the InferenceEngine trait
//! using whisper-rs. Items within a batch are decoded one after another;
//! whisper.cpp owns its own threading, so the batch loop stays serial.
//! Prompt tokens are not forwarded: whisper.cpp composes its own start
//! sequence from the per-item language.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be
//! installed. To build with Whisper support:
//!
//! ```bash
//! cargo build --features whisper
//! ```

use crate::batch::Batch;
use crate::error::{BatchscribeError, Result};
use crate::inference::{InferenceEngine, RawOutput};
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for the Whisper engine.
#[derive(Debug, Clone)]
pub struct WhisperEngineConfig {
    /// Path to the Whisper model file.
    pub model_path: PathBuf,
    /// Number of threads for inference (None = auto-detect).
    pub threads: Option<usize>,
}

impl Default for WhisperEngineConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.bin"),
            threads: None,
        }
    }
}

/// Whisper-based engine implementation.
///
/// The WhisperContext is wrapped in a Mutex, so one generate call runs at a
/// time regardless of how the batches are dispatched.
#[cfg(feature = "whisper")]
pub struct WhisperEngine {
    context: Mutex<WhisperContext>,
    config: WhisperEngineConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper engine placeholder (without whisper feature).
///
/// This is a stub implementation that returns errors when used.
/// Enable the `whisper` feature to use real inference.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine {
    config: WhisperEngineConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl WhisperEngine {
    /// Create a new Whisper engine.
    ///
    /// # Errors
    /// Returns `ModelNotFound` if the model file doesn't exist and
    /// `InferenceFailed` if model loading fails.
    pub fn new(config: WhisperEngineConfig) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(BatchscribeError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let context_params = WhisperContextParameters::default();
        let context = WhisperContext::new_with_params(
            config.model_path.to_str().ok_or_else(|| {
                BatchscribeError::InferenceFailed {
                    message: "Invalid UTF-8 in model path".to_string(),
                }
            })?,
            context_params,
        )
        .map_err(|e| BatchscribeError::InferenceFailed {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &WhisperEngineConfig {
        &self.config
    }

    fn decode_item(
        &self,
        context: &WhisperContext,
        audio: &[f32],
        language: &str,
    ) -> Result<RawOutput> {
        let mut state =
            context
                .create_state()
                .map_err(|e| BatchscribeError::InferenceFailed {
                    message: format!("Failed to create Whisper state: {}", e),
                })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(language));
        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, audio)
            .map_err(|e| BatchscribeError::InferenceFailed {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(&segment.to_string());
        }

        Ok(RawOutput {
            text: text.trim().to_string(),
            ..Default::default()
        })
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Create a new Whisper engine (stub implementation).
    pub fn new(config: WhisperEngineConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(BatchscribeError::ModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self { config, model_name })
    }

    /// Get the configuration.
    pub fn config(&self) -> &WhisperEngineConfig {
        &self.config
    }
}

#[cfg(feature = "whisper")]
impl InferenceEngine for WhisperEngine {
    fn generate(&self, batch: &Batch) -> Result<Vec<RawOutput>> {
        let context =
            self.context
                .lock()
                .map_err(|e| BatchscribeError::InferenceFailed {
                    message: format!("Failed to acquire context lock: {}", e),
                })?;

        batch
            .items
            .iter()
            .map(|item| self.decode_item(&context, &item.audio, &item.language))
            .collect()
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl InferenceEngine for WhisperEngine {
    fn generate(&self, _batch: &Batch) -> Result<Vec<RawOutput>> {
        Err(BatchscribeError::InferenceFailed {
            message: "Whisper support not compiled in. Rebuild with --features whisper".to_string(),
        })
    }

    fn name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_file_errors() {
        let config = WhisperEngineConfig {
            model_path: PathBuf::from("/nonexistent/model.bin"),
            threads: None,
        };
        let result = WhisperEngine::new(config);
        assert!(matches!(result, Err(BatchscribeError::ModelNotFound { .. })));
    }

    #[test]
    fn test_default_config() {
        let config = WhisperEngineConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/ggml-base.bin"));
        assert!(config.threads.is_none());
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_stub_engine_reports_not_ready() {
        use tempfile::NamedTempFile;

        let model = NamedTempFile::new().unwrap();
        let config = WhisperEngineConfig {
            model_path: model.path().to_path_buf(),
            threads: None,
        };
        let engine = WhisperEngine::new(config).unwrap();

        assert!(!engine.is_ready());
        let batch = Batch {
            index: 0,
            items: vec![],
        };
        assert!(engine.generate(&batch).is_err());
    }
}
