//! Speech segment detection over a frame-score stream.
//!
//! Single-pass hysteresis thresholding, close-time merging of nearby
//! segments, noise dropping, and iterative splitting of segments that
//! exceed the inference context window.

use crate::defaults;
use crate::error::{BatchscribeError, Result};
use crate::segment::types::SpeechSegment;
use crate::vad::FrameScore;
use serde::{Deserialize, Serialize};

/// Configuration for segment detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Frame stride in seconds.
    pub frame_size: f32,
    /// Minimum duration in seconds for a segment to survive.
    pub min_seg_len: f32,
    /// Maximum duration in seconds of a merged segment.
    pub max_seg_len: f32,
    /// Maximum silent gap in seconds across which adjacent segments merge.
    pub max_silent_region: f32,
    /// Time padding in seconds applied around each retained segment.
    pub padding: f32,
    /// End-of-speech probability threshold.
    pub eos_threshold: f32,
    /// Begin-of-speech probability threshold.
    pub bos_threshold: f32,
    /// Divisor controlling where oversized segments are cut.
    pub cut_factor: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            frame_size: defaults::FRAME_SIZE,
            min_seg_len: defaults::MIN_SEG_LEN,
            max_seg_len: defaults::MAX_SEG_LEN,
            max_silent_region: defaults::MAX_SILENT_REGION,
            padding: defaults::SEGMENT_PADDING,
            eos_threshold: defaults::EOS_THRESHOLD,
            bos_threshold: defaults::BOS_THRESHOLD,
            cut_factor: defaults::CUT_FACTOR,
        }
    }
}

impl DetectorConfig {
    /// Validates the configuration, rejecting degenerate windows.
    ///
    /// Called at construction time so that bad tunables fail fast instead
    /// of mid-stream.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size <= 0.0 {
            return Err(invalid("frame_size", "must be positive"));
        }
        if self.max_seg_len <= 0.0 {
            return Err(invalid("max_seg_len", "must be positive"));
        }
        if self.cut_factor == 0 {
            return Err(invalid("cut_factor", "must be at least 1"));
        }
        if self.min_seg_len < 0.0 {
            return Err(invalid("min_seg_len", "must not be negative"));
        }
        if self.max_silent_region < 0.0 {
            return Err(invalid("max_silent_region", "must not be negative"));
        }
        if self.padding < 0.0 {
            return Err(invalid("padding", "must not be negative"));
        }
        for (key, value) in [
            ("bos_threshold", self.bos_threshold),
            ("eos_threshold", self.eos_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(key, "must be within [0, 1]"));
            }
        }
        let cut_idx = self.max_seg_len / (self.cut_factor as f32 * self.frame_size);
        if cut_idx < 1.0 {
            return Err(invalid(
                "max_seg_len",
                "cut window is shorter than one frame",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> BatchscribeError {
    BatchscribeError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Frame-index span of a coarse segment before splitting.
#[derive(Debug, Clone, Copy)]
struct IndexSpan {
    start: usize,
    end: usize,
}

/// Detects speech segments in a frame-score stream.
///
/// Pure and immutable after construction; changing a tunable means
/// building a new detector from a new [`DetectorConfig`].
#[derive(Debug, Clone)]
pub struct SegmentDetector {
    config: DetectorConfig,
    /// Index into the score stream where the cut search window opens.
    cut_idx: usize,
    /// Maximum frame count of any emitted segment.
    max_idx_in_seg: usize,
}

impl SegmentDetector {
    /// Creates a detector, validating the configuration.
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let cut_idx = (config.max_seg_len / (config.cut_factor as f32 * config.frame_size)) as usize;
        let max_idx_in_seg = config.cut_factor as usize * cut_idx;
        Ok(Self {
            config,
            cut_idx,
            max_idx_in_seg,
        })
    }

    /// Returns the configuration this detector was built from.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Converts frame scores into padded, clamped speech segments.
    ///
    /// Runs in a single pass over the scores. A fully silent stream (or an
    /// empty one) yields the fallback segment `[0, max_seg_len]` clamped to
    /// the audio duration, so non-speech audio still produces a processable
    /// unit instead of an empty result.
    pub fn detect(&self, scores: &[FrameScore], audio_duration: f32) -> Vec<SpeechSegment> {
        let coarse = self.threshold_pass(scores);
        let mut segments = self.split_and_pad(scores, &coarse);

        if segments.is_empty() {
            // Quick fix for silent audio.
            segments.push(SpeechSegment::new(0.0, self.config.max_seg_len));
        }

        // Fix edges.
        segments[0].start = segments[0].start.max(0.0);
        let last = segments.len() - 1;
        segments[last].end = segments[last].end.min(audio_duration);

        segments
    }

    /// Hysteresis thresholding with close-time merging.
    fn threshold_pass(&self, scores: &[FrameScore]) -> Vec<IndexSpan> {
        let mut in_speech = false;
        let mut start_idx = 0usize;
        let mut spans: Vec<IndexSpan> = Vec::new();

        for (idx, frame) in scores.iter().enumerate() {
            if in_speech {
                if frame.probability < self.config.eos_threshold {
                    in_speech = false;
                    self.close_span(
                        scores,
                        &mut spans,
                        IndexSpan {
                            start: start_idx,
                            end: idx - 1,
                        },
                    );
                }
            } else if frame.probability >= self.config.bos_threshold {
                in_speech = true;
                start_idx = idx;
            }
        }

        if in_speech {
            self.close_span(
                scores,
                &mut spans,
                IndexSpan {
                    start: start_idx,
                    end: scores.len() - 1,
                },
            );
        }

        // Drop detector noise.
        spans.retain(|s| scores[s.end].end - scores[s.start].start > self.config.min_seg_len);
        spans
    }

    /// Appends a freshly closed span, merging it into the previous one when
    /// the silent gap is small and the merged span still fits the window.
    fn close_span(&self, scores: &[FrameScore], spans: &mut Vec<IndexSpan>, curr: IndexSpan) {
        if let Some(last) = spans.last_mut()
            && scores[curr.start].start - scores[last.end].end < self.config.max_silent_region
            && scores[curr.end].end - scores[last.start].start <= self.config.max_seg_len
        {
            last.end = curr.end;
        } else {
            spans.push(curr);
        }
    }

    /// Splits oversized spans at the quietest frame inside the cut window,
    /// then pads each coarse span's first and last piece.
    fn split_and_pad(&self, scores: &[FrameScore], coarse: &[IndexSpan]) -> Vec<SpeechSegment> {
        let mut out: Vec<SpeechSegment> = Vec::new();

        for span in coarse {
            let first_piece = out.len();
            let mut start = span.start;
            let end = span.end;

            while end - start > self.max_idx_in_seg {
                let cut_from = start + self.cut_idx;
                let cut_to = (start + self.max_idx_in_seg).min(end);
                let new_end = cut_from + argmin_probability(&scores[cut_from..cut_to]);

                out.push(SpeechSegment::new(
                    scores[start].start,
                    scores[new_end].end,
                ));
                start = new_end + 1;
            }

            out.push(SpeechSegment::new(
                scores[start].start,
                scores[end].end + self.config.padding,
            ));
            out[first_piece].start -= self.config.padding;
        }

        out
    }
}

/// Index of the lowest-probability frame, 0 for an empty slice.
fn argmin_probability(scores: &[FrameScore]) -> usize {
    let mut best = 0usize;
    let mut best_prob = f32::INFINITY;
    for (idx, frame) in scores.iter().enumerate() {
        if frame.probability < best_prob {
            best_prob = frame.probability;
            best = idx;
        }
    }
    best
}
