//! batchscribe - Batched speech segmentation and transcription pipeline
//!
//! Turns raw PCM audio plus per-request parameters into ordered,
//! timestamped transcript segments, delegating the actual decoding to an
//! external inference engine.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod inference;
pub mod reassembly;
pub mod segment;
pub mod service;
pub mod vad;
pub mod vocab;

// Core traits (score → segment → batch → decode → reassemble)
pub use inference::{InferenceEngine, MockEngine, RawOutput, RawWordTiming};
pub use vad::{EnergyScorer, FrameScore, FrameScoreSource, MockScoreSource};
pub use vocab::{PromptVocabulary, StaticVocabulary, Task, TokenId};

// Pipeline
pub use segment::{DetectorConfig, SegmentDetector, SpeechSegment, StitchedUnit, stitch};
pub use batch::{Batch, BatchItem, BatcherConfig, Collator, WorkItem};
pub use reassembly::{Reassembler, SegmentResult, WordTiming};
pub use service::{CancelToken, RequestOutcome, TranscriptionRequest, TranscriptionService};

// Error handling
pub use error::{BatchscribeError, ErrorReporter, Result, StderrReporter};

// Config
pub use config::{Config, EngineConfig};

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
