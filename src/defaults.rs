//! Default configuration constants for batchscribe.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Stride of the frame-score stream in seconds.
///
/// Each voice-activity score covers one 20ms frame of audio. All index
/// arithmetic in the segment detector assumes this fixed stride.
pub const FRAME_SIZE: f32 = 0.02;

/// Minimum duration in seconds for a detected segment to survive.
///
/// Anything shorter is treated as detector noise and dropped.
pub const MIN_SEG_LEN: f32 = 0.08;

/// Maximum speech length in seconds for a single inference unit.
///
/// Set just under the 30s model context window so that segment padding
/// never pushes a unit past the window.
pub const MAX_SEG_LEN: f32 = 29.0;

/// Maximum silent gap in seconds tolerated when merging adjacent segments.
pub const MAX_SILENT_REGION: f32 = 0.6;

/// Time padding in seconds applied before and after each retained segment.
///
/// Captures soft onsets and word endings that fall just outside the
/// thresholded region.
pub const SEGMENT_PADDING: f32 = 0.2;

/// Begin-of-speech probability threshold.
pub const BOS_THRESHOLD: f32 = 0.3;

/// End-of-speech probability threshold.
///
/// Kept equal to [`BOS_THRESHOLD`] by default; lowering it adds hysteresis
/// so brief dips below the begin threshold do not end a segment.
pub const EOS_THRESHOLD: f32 = 0.3;

/// Divisor controlling where oversized segments are cut.
///
/// A segment longer than `cut_factor * (max_seg_len / (cut_factor * frame_size))`
/// frames is split at the quietest frame past the `1/cut_factor` mark.
pub const CUT_FACTOR: u32 = 2;

/// Model context window in seconds.
pub const MAX_CONTEXT_SECS: f32 = 30.0;

/// Model context window in samples at [`SAMPLE_RATE`].
pub const MAX_CONTEXT_SAMPLES: usize = (MAX_CONTEXT_SECS as usize) * (SAMPLE_RATE as usize);

/// Margin in seconds added to the longest item when dynamic time-axis
/// padding is enabled.
pub const DTA_PADDING_SECS: f32 = 3.0;

/// Maximum number of initial-prompt tokens kept per request.
///
/// Half the 448-token text window minus one, matching the decoder's
/// prompt budget.
pub const MAX_INITIAL_PROMPT_LEN: usize = 223;

/// Default number of items per inference batch.
pub const BATCH_SIZE: usize = 8;

/// Default language code for transcription.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Reference RMS level mapped to full speech probability by the energy scorer.
///
/// An RMS of 0.02 (a typical speech floor for normalized microphone input)
/// lands at a score of 0.3, right on the default begin-of-speech threshold.
pub const SCORE_REFERENCE_LEVEL: f32 = 0.0667;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_samples_matches_secs() {
        assert_eq!(MAX_CONTEXT_SAMPLES, 480_000);
    }

    #[test]
    fn speech_floor_maps_to_bos_threshold() {
        let score = 0.02 / SCORE_REFERENCE_LEVEL;
        assert!((score - BOS_THRESHOLD).abs() < 0.01);
    }
}
