//! Reassembling batch outputs into per-request transcripts.
//!
//! Each raw output is paired with the batch item it came from, stamped with
//! the unit's wall-clock span, and appended to its request's buffer. Because
//! the collator preserves per-request unit order and batches are applied in
//! emission order, each buffer ends up chronological without sorting.
//!
//! Batches may complete out of order when dispatched concurrently; they are
//! parked in an index-keyed map and applied strictly in order.

use crate::batch::Batch;
use crate::error::{BatchscribeError, Result};
use crate::inference::{RawOutput, RawWordTiming};
use crate::segment::StitchedUnit;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Word-level timing in absolute recording time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordTiming {
    /// The word text.
    pub word: String,
    /// Absolute start time in seconds.
    pub start: f64,
    /// Absolute end time in seconds.
    pub end: f64,
    /// Word probability.
    pub prob: f32,
}

/// One transcribed unit of one request, in absolute time.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentResult {
    /// Batch-local id of the originating request.
    #[serde(rename = "requestId")]
    pub request_id: u32,
    /// Decoded text.
    pub text: String,
    /// Unit start in seconds, millisecond precision.
    #[serde(rename = "startTime")]
    pub start: f64,
    /// Unit end in seconds, millisecond precision.
    #[serde(rename = "endTime")]
    pub end: f64,
    /// Average token log-probability, when the engine reports scores.
    #[serde(rename = "avgLogProb", skip_serializing_if = "Option::is_none")]
    pub avg_logprob: Option<f32>,
    /// No-speech probability, when the engine reports it.
    #[serde(rename = "noSpeechProb", skip_serializing_if = "Option::is_none")]
    pub no_speech_prob: Option<f32>,
    /// Re-based word timings, when alignment was requested.
    #[serde(rename = "wordTimings", skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTiming>>,
}

/// Rounds seconds to millisecond precision.
fn round_ms(secs: f32) -> f64 {
    (secs as f64 * 1000.0).round() / 1000.0
}

/// Converts unit-local word timings to absolute time.
///
/// The unit's audio elides silence between sub-segments, so a word's local
/// time drifts behind absolute time by the sum of the elided gaps before
/// it. Walks the sub-segments in stitching order, carrying a cumulative
/// offset that starts at the unit's absolute start and grows by each gap
/// crossed. Sub-segment boundaries are never skipped.
pub fn rebase_words(words: &[RawWordTiming], unit: &StitchedUnit) -> Vec<WordTiming> {
    let segments = &unit.segments;
    let mut seg_idx = 0usize;
    let mut offset = unit.start();

    words
        .iter()
        .map(|w| {
            while seg_idx + 1 < segments.len() && w.start + offset >= segments[seg_idx].end {
                seg_idx += 1;
                offset += segments[seg_idx].start - segments[seg_idx - 1].end;
            }
            WordTiming {
                word: w.word.clone(),
                start: round_ms(w.start + offset),
                end: round_ms(w.end + offset),
                prob: w.prob,
            }
        })
        .collect()
}

/// Accumulates batch outputs into per-request result buffers.
///
/// Owned by one transcription call; request buffers are drained with
/// [`Reassembler::take`] once every batch has been absorbed.
#[derive(Debug, Default)]
pub struct Reassembler {
    responses: HashMap<u32, Vec<SegmentResult>>,
    failures: HashMap<u32, String>,
    cancelled: HashSet<u32>,
    parked: BTreeMap<u64, (Batch, std::result::Result<Vec<RawOutput>, String>)>,
    next_index: u64,
}

impl Reassembler {
    /// Creates an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a request as cancelled; its results are discarded, not returned.
    pub fn mark_cancelled(&mut self, request_id: u32) {
        self.cancelled.insert(request_id);
    }

    /// Absorbs one batch outcome, applying parked batches in index order.
    pub fn absorb(&mut self, batch: Batch, outcome: Result<Vec<RawOutput>>) {
        let outcome = outcome.map_err(|e| e.to_string());
        self.parked.insert(batch.index, (batch, outcome));

        while let Some((batch, outcome)) = self.parked.remove(&self.next_index) {
            self.apply(batch, outcome);
            self.next_index += 1;
        }
    }

    fn apply(&mut self, batch: Batch, outcome: std::result::Result<Vec<RawOutput>, String>) {
        let outputs = match outcome {
            Ok(outputs) if outputs.len() == batch.items.len() => outputs,
            Ok(outputs) => {
                // Engine broke the one-output-per-item contract; fault the
                // whole batch rather than misattribute results.
                let message = format!(
                    "engine returned {} outputs for {} items",
                    outputs.len(),
                    batch.items.len()
                );
                self.fail_batch(&batch, &message);
                return;
            }
            Err(message) => {
                self.fail_batch(&batch, &message);
                return;
            }
        };

        for (item, output) in batch.items.into_iter().zip(outputs) {
            if self.cancelled.contains(&item.request_id) {
                continue;
            }
            let words = output.words.map(|ws| rebase_words(&ws, &item.unit));
            self.responses
                .entry(item.request_id)
                .or_default()
                .push(SegmentResult {
                    request_id: item.request_id,
                    text: output.text,
                    start: round_ms(item.unit.start()),
                    end: round_ms(item.unit.end()),
                    avg_logprob: output.avg_logprob,
                    no_speech_prob: output.no_speech_prob,
                    words,
                });
        }
    }

    /// Faults every request that had an item in the batch. Requests keep
    /// their fault even if other batches of theirs succeeded.
    fn fail_batch(&mut self, batch: &Batch, message: &str) {
        for item in &batch.items {
            self.failures
                .entry(item.request_id)
                .or_insert_with(|| message.to_string());
        }
    }

    /// Number of batches applied so far.
    pub fn applied(&self) -> u64 {
        self.next_index
    }

    /// Drains one request's results.
    ///
    /// Call only after every batch has been absorbed: a cancelled request
    /// yields `RequestCancelled`, a request that shared a failed batch
    /// yields `InferenceFailed`, anything else yields its chronological
    /// segment list.
    pub fn take(&mut self, request_id: u32) -> Result<Vec<SegmentResult>> {
        if self.cancelled.contains(&request_id) {
            return Err(BatchscribeError::RequestCancelled { request_id });
        }
        if let Some(message) = self.failures.remove(&request_id) {
            return Err(BatchscribeError::InferenceFailed { message });
        }
        Ok(self.responses.remove(&request_id).unwrap_or_default())
    }
}
