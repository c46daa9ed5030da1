//! Transcription service: the composition root of the pipeline.
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │  scorer  │──▶│ detector │──▶│ stitcher │──▶│  collator │──▶│   engine    │
//! │ (frames) │   │          │   │          │   │ (fans in) │   │ (batched)   │
//! └──────────┘   └──────────┘   └──────────┘   └───────────┘   └──────┬──────┘
//!      per request, parallel          │         single writer         │
//!                                     │                               ▼
//!                                     │                        ┌─────────────┐
//!                                     └───────────────────────▶│ reassembler │──▶ per-request results
//!                                                              └─────────────┘
//! ```
//!
//! Detection and stitching are pure per-request transforms and run on
//! scoped threads. Batch construction is the single synchronization point.
//! Inference calls are opaque and blocking; batches run one at a time
//! unless the engine is declared safe for overlap via `max_in_flight`.

use crate::audio;
use crate::batch::{Batch, Batches, Collator, WorkItem};
use crate::config::Config;
use crate::defaults;
use crate::error::{BatchscribeError, ErrorReporter, Result, StderrReporter};
use crate::inference::{InferenceEngine, RawOutput};
use crate::reassembly::{Reassembler, SegmentResult};
use crate::segment::{SegmentDetector, StitchedUnit, stitch};
use crate::vad::FrameScoreSource;
use crate::vocab::{PromptVocabulary, Task, TokenId};
use crossbeam_channel::bounded;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Cooperative cancellation handle for one request.
///
/// Cancelling stops further units of the request from being dispatched;
/// items already inside a batch may still be computed, but their results
/// are discarded during reassembly.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the request as abandoned.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once the request was abandoned.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// One transcription request.
///
/// Owned by the pipeline for the duration of one call and never mutated
/// after submission. Request ids are assigned positionally by
/// [`TranscriptionService::transcribe_batch`].
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    /// Normalized mono samples at 16kHz.
    pub audio: Vec<f32>,
    /// Language code, e.g. "en".
    pub language: String,
    /// Decoding task.
    pub task: Task,
    /// Optional initial-context tokens; truncated to the configured budget.
    pub initial_prompt_tokens: Vec<TokenId>,
    /// Cancellation handle.
    pub cancel: CancelToken,
}

impl TranscriptionRequest {
    /// Creates a request with the default task and no initial prompt.
    pub fn new(audio: Vec<f32>, language: &str) -> Self {
        Self {
            audio,
            language: language.to_string(),
            task: Task::default(),
            initial_prompt_tokens: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Sets the decoding task.
    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    /// Sets the initial-context tokens.
    pub fn with_initial_prompt(mut self, tokens: Vec<TokenId>) -> Self {
        self.initial_prompt_tokens = tokens;
        self
    }

    /// Attaches an external cancellation token.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}

/// Per-request outcome of a batched transcription call.
#[derive(Debug)]
pub struct RequestOutcome {
    /// Positional id of the request.
    pub request_id: u32,
    /// The request's chronological segments, or its request- or
    /// batch-scoped fault.
    pub result: Result<Vec<SegmentResult>>,
}

/// The transcription pipeline front end.
pub struct TranscriptionService {
    config: Config,
    detector: SegmentDetector,
    collator: Collator,
    scorer: Arc<dyn FrameScoreSource>,
    vocab: Arc<dyn PromptVocabulary>,
    engine: Arc<dyn InferenceEngine>,
    reporter: Arc<dyn ErrorReporter>,
}

impl TranscriptionService {
    /// Builds a service from its collaborators, validating the
    /// configuration up front.
    pub fn new(
        config: Config,
        scorer: Arc<dyn FrameScoreSource>,
        vocab: Arc<dyn PromptVocabulary>,
        engine: Arc<dyn InferenceEngine>,
    ) -> Result<Self> {
        config.validate()?;
        let detector = SegmentDetector::new(config.detector)?;
        let collator = Collator::new(config.batcher.clone(), vocab.clone())?;
        Ok(Self {
            config,
            detector,
            collator,
            scorer,
            vocab,
            engine,
            reporter: Arc::new(StderrReporter),
        })
    }

    /// Sets a custom error reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Returns the configuration this service was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transcribes one raw PCM payload.
    ///
    /// Synchronous from the caller's perspective; internally segmented,
    /// batched, and reassembled. The payload is 16-bit little-endian mono
    /// PCM at 16kHz.
    pub fn transcribe(
        &self,
        audio: &[u8],
        language: &str,
        task: Task,
        initial_prompt_tokens: Vec<TokenId>,
        batch_size: usize,
    ) -> Result<Vec<SegmentResult>> {
        let samples = audio::decode_pcm16(audio)?;
        let request = TranscriptionRequest::new(samples, language)
            .with_task(task)
            .with_initial_prompt(initial_prompt_tokens);

        let mut outcomes = self.transcribe_batch(vec![request], batch_size)?;
        outcomes.remove(0).result
    }

    /// Transcribes several requests, interleaving their units into shared
    /// batches.
    ///
    /// Returns one outcome per request, in submission order. A failing
    /// batch faults every request that had an item in it; requests in
    /// other batches are unaffected.
    pub fn transcribe_batch(
        &self,
        requests: Vec<TranscriptionRequest>,
        batch_size: usize,
    ) -> Result<Vec<RequestOutcome>> {
        if batch_size == 0 {
            return Err(BatchscribeError::ConfigInvalidValue {
                key: "batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        // Segmentation and stitching are embarrassingly parallel across
        // requests.
        let prepared: Vec<Result<Vec<WorkItem>>> = thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .enumerate()
                .map(|(id, request)| scope.spawn(move || self.prepare_request(id as u32, request)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(BatchscribeError::Other(
                            "segmentation thread panicked".to_string(),
                        ))
                    })
                })
                .collect()
        });

        let mut reassembler = Reassembler::new();
        let mut request_errors: Vec<Option<BatchscribeError>> = Vec::with_capacity(requests.len());
        let mut items: Vec<WorkItem> = Vec::new();

        for (id, result) in prepared.into_iter().enumerate() {
            match result {
                Ok(mut request_items) => {
                    if requests[id].cancel.is_cancelled() {
                        // Abandoned before any unit was dispatched.
                        reassembler.mark_cancelled(id as u32);
                    } else {
                        items.append(&mut request_items);
                    }
                    request_errors.push(None);
                }
                // Request-scoped fault; other requests keep flowing.
                Err(e) => request_errors.push(Some(e)),
            }
        }

        let batches = self.collator.collate(items, batch_size)?;
        if self.config.batcher.max_in_flight <= 1 {
            for batch in batches {
                self.sweep_cancellations(&requests, &mut reassembler);
                let outcome = self.engine.generate(&batch);
                if let Err(ref e) = outcome {
                    self.reporter.report("inference", e);
                }
                reassembler.absorb(batch, outcome);
            }
        } else {
            self.dispatch_concurrent(batches, &requests, &mut reassembler);
        }
        self.sweep_cancellations(&requests, &mut reassembler);

        let outcomes = request_errors
            .into_iter()
            .enumerate()
            .map(|(id, error)| {
                let request_id = id as u32;
                let result = match error {
                    Some(e) => Err(e),
                    None => reassembler.take(request_id),
                };
                RequestOutcome { request_id, result }
            })
            .collect();

        Ok(outcomes)
    }

    /// Scores, detects, and stitches one request into work items.
    fn prepare_request(
        &self,
        request_id: u32,
        request: &TranscriptionRequest,
    ) -> Result<Vec<WorkItem>> {
        let batcher = &self.config.batcher;

        let duration = audio::duration_secs(&request.audio, defaults::SAMPLE_RATE);
        let scores = self.scorer.score(&request.audio)?;
        let segments = self.detector.detect(&scores, duration);

        let units: Vec<StitchedUnit> = if batcher.merge_chunks {
            stitch(&segments, batcher.max_speech_len, batcher.max_silent_region)
        } else {
            segments
                .iter()
                .map(|seg| StitchedUnit::new(vec![*seg]))
                .collect()
        };

        let mut control = self.vocab.control_tokens(request.task, &request.language)?;
        control.push(if batcher.without_timestamps {
            self.vocab.no_timestamps_token()
        } else {
            self.vocab.timestamp_begin_token()
        });

        let tokens = &request.initial_prompt_tokens;
        let keep = batcher.max_initial_prompt_len.min(tokens.len());
        let context = tokens[tokens.len() - keep..].to_vec();

        Ok(units
            .into_iter()
            .map(|unit| {
                let unit_audio = audio::slice_unit(&request.audio, &unit, defaults::SAMPLE_RATE);
                WorkItem {
                    request_id,
                    unit,
                    audio: unit_audio,
                    language: request.language.clone(),
                    control_tokens: control.clone(),
                    context_tokens: context.clone(),
                }
            })
            .collect())
    }

    /// Propagates flipped cancel tokens into the reassembler.
    fn sweep_cancellations(&self, requests: &[TranscriptionRequest], reassembler: &mut Reassembler) {
        for (id, request) in requests.iter().enumerate() {
            if request.cancel.is_cancelled() {
                reassembler.mark_cancelled(id as u32);
            }
        }
    }

    /// Fans batches out to `max_in_flight` worker threads.
    ///
    /// One collector thread owns the reassembler while the current thread
    /// feeds batches; the reassembler re-orders completions by batch index,
    /// so worker scheduling cannot perturb per-request chronology.
    fn dispatch_concurrent(
        &self,
        batches: Batches<'_>,
        requests: &[TranscriptionRequest],
        reassembler: &mut Reassembler,
    ) {
        let workers = self.config.batcher.max_in_flight;
        let (batch_tx, batch_rx) = bounded::<Batch>(workers);
        let (result_tx, result_rx) = bounded::<(Batch, Result<Vec<RawOutput>>)>(workers);

        thread::scope(|scope| {
            for _ in 0..workers {
                let batch_rx = batch_rx.clone();
                let result_tx = result_tx.clone();
                let engine = &self.engine;
                scope.spawn(move || {
                    while let Ok(batch) = batch_rx.recv() {
                        let outcome = engine.generate(&batch);
                        if result_tx.send((batch, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(batch_rx);
            drop(result_tx);

            let reporter = &self.reporter;
            scope.spawn(move || {
                while let Ok((batch, outcome)) = result_rx.recv() {
                    for (id, request) in requests.iter().enumerate() {
                        if request.cancel.is_cancelled() {
                            reassembler.mark_cancelled(id as u32);
                        }
                    }
                    if let Err(ref e) = outcome {
                        reporter.report("inference", e);
                    }
                    reassembler.absorb(batch, outcome);
                }
            });

            for batch in batches {
                if batch_tx.send(batch).is_err() {
                    break;
                }
            }
            drop(batch_tx);
        });
    }
}
