//! Error types for batchscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchscribeError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio input errors
    #[error("Invalid audio input: {message}")]
    InvalidAudioInput { message: String },

    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    // Inference errors
    #[error("Inference model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Inference failed: {message}")]
    InferenceFailed { message: String },

    // Prompt/vocabulary errors
    #[error("Unknown language code: {code}")]
    UnknownLanguage { code: String },

    // Request lifecycle
    #[error("Request {request_id} was cancelled")]
    RequestCancelled { request_id: u32 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, BatchscribeError>;

/// Trait for reporting pipeline faults that do not abort the whole call.
///
/// A failing inference batch is reported here and carried into the affected
/// requests' outcomes; other batches keep flowing.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a pipeline stage.
    fn report(&self, stage: &str, error: &BatchscribeError);
}

/// Simple error reporter that logs to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrReporter;

impl ErrorReporter for StderrReporter {
    fn report(&self, stage: &str, error: &BatchscribeError) {
        eprintln!("batchscribe: [{}] {}", stage, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = BatchscribeError::ConfigInvalidValue {
            key: "max_seg_len".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for max_seg_len: must be positive"
        );
    }

    #[test]
    fn test_invalid_audio_input_display() {
        let error = BatchscribeError::InvalidAudioInput {
            message: "odd byte count".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid audio input: odd byte count");
    }

    #[test]
    fn test_model_not_found_display() {
        let error = BatchscribeError::ModelNotFound {
            path: "/models/ggml-base.bin".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Inference model not found at /models/ggml-base.bin"
        );
    }

    #[test]
    fn test_inference_failed_display() {
        let error = BatchscribeError::InferenceFailed {
            message: "out of memory".to_string(),
        };
        assert_eq!(error.to_string(), "Inference failed: out of memory");
    }

    #[test]
    fn test_unknown_language_display() {
        let error = BatchscribeError::UnknownLanguage {
            code: "xx".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown language code: xx");
    }

    #[test]
    fn test_request_cancelled_display() {
        let error = BatchscribeError::RequestCancelled { request_id: 3 };
        assert_eq!(error.to_string(), "Request 3 was cancelled");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: BatchscribeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: BatchscribeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BatchscribeError>();
        assert_sync::<BatchscribeError>();
    }

    #[test]
    fn test_stderr_reporter_does_not_panic() {
        let reporter = StderrReporter;
        let error = BatchscribeError::Other("test error".to_string());
        reporter.report("collate", &error);
    }
}
