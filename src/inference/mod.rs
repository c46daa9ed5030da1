//! Inference engine seam.
//!
//! The decoder is a black box behind [`InferenceEngine`]: a batch of padded
//! audio plus prompts in, one raw output per item out, order preserved.
//! Any engine implementing `generate` can be substituted; no inheritance
//! hierarchy, just this trait.

pub mod whisper;

use crate::batch::Batch;
use crate::error::{BatchscribeError, Result};
use crate::vocab::TokenId;
use std::sync::Arc;

pub use whisper::{WhisperEngine, WhisperEngineConfig};

/// Word-level timing relative to a unit's concatenated audio.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWordTiming {
    /// The word text.
    pub word: String,
    /// Start time in seconds, unit-local.
    pub start: f32,
    /// End time in seconds, unit-local.
    pub end: f32,
    /// Word probability.
    pub prob: f32,
}

/// Raw decoder output for one batch item.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    /// Decoded text.
    pub text: String,
    /// Decoded token ids, when the engine reports them.
    pub tokens: Vec<TokenId>,
    /// Average token log-probability, if the engine reports scores.
    pub avg_logprob: Option<f32>,
    /// No-speech probability, if the engine reports it.
    pub no_speech_prob: Option<f32>,
    /// Word-level alignment, if requested and supported.
    pub words: Option<Vec<RawWordTiming>>,
}

/// Trait for batched speech decoding.
///
/// `generate` must return exactly one output per batch item, in item order.
/// A call is treated as opaque and potentially blocking; callers must not
/// overlap calls on one engine unless it documents support for that.
pub trait InferenceEngine: Send + Sync {
    /// Decodes a batch of padded audio buffers with their prompts.
    fn generate(&self, batch: &Batch) -> Result<Vec<RawOutput>>;

    /// Get the name of the loaded model.
    fn name(&self) -> &str;

    /// Check if the engine is ready.
    fn is_ready(&self) -> bool;
}

/// Implement InferenceEngine for Arc<T> to allow sharing across threads.
impl<T: InferenceEngine> InferenceEngine for Arc<T> {
    fn generate(&self, batch: &Batch) -> Result<Vec<RawOutput>> {
        (**self).generate(batch)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock engine for testing.
#[derive(Debug, Clone)]
pub struct MockEngine {
    name: String,
    response: String,
    should_fail: bool,
    words: Option<Vec<RawWordTiming>>,
    avg_logprob: Option<f32>,
    no_speech_prob: Option<f32>,
}

impl MockEngine {
    /// Create a new mock engine with default settings.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: "mock transcription".to_string(),
            should_fail: false,
            words: None,
            avg_logprob: None,
            no_speech_prob: None,
        }
    }

    /// Configure the mock to return a specific text for every item.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on generate.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to attach unit-local word timings to every item.
    pub fn with_words(mut self, words: Vec<RawWordTiming>) -> Self {
        self.words = Some(words);
        self
    }

    /// Configure the mock to report scores.
    pub fn with_scores(mut self, avg_logprob: f32, no_speech_prob: f32) -> Self {
        self.avg_logprob = Some(avg_logprob);
        self.no_speech_prob = Some(no_speech_prob);
        self
    }
}

impl InferenceEngine for MockEngine {
    fn generate(&self, batch: &Batch) -> Result<Vec<RawOutput>> {
        if self.should_fail {
            return Err(BatchscribeError::InferenceFailed {
                message: "mock inference failure".to_string(),
            });
        }
        Ok(batch
            .items
            .iter()
            .map(|_| RawOutput {
                text: self.response.clone(),
                tokens: Vec::new(),
                avg_logprob: self.avg_logprob,
                no_speech_prob: self.no_speech_prob,
                words: self.words.clone(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}
