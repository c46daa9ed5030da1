//! Frame-level voice-activity scoring.
//!
//! The segment detector consumes a stream of per-frame speech probabilities.
//! Where those scores come from is behind the [`FrameScoreSource`] trait:
//! a neural VAD, an energy heuristic, or a canned sequence in tests.

use crate::defaults;
use crate::error::Result;

/// Speech probability for one fixed-stride audio frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameScore {
    /// Speech probability in `[0, 1]`.
    pub probability: f32,
    /// Frame start time in seconds.
    pub start: f32,
    /// Frame end time in seconds.
    pub end: f32,
}

impl FrameScore {
    /// Creates a new frame score.
    pub fn new(probability: f32, start: f32, end: f32) -> Self {
        Self {
            probability,
            start,
            end,
        }
    }
}

/// Trait for producing frame scores from an audio signal.
///
/// Implementations must be deterministic for identical input and must cover
/// the full signal duration at a uniform stride.
pub trait FrameScoreSource: Send + Sync {
    /// Scores the given normalized mono samples.
    fn score(&self, audio: &[f32]) -> Result<Vec<FrameScore>>;
}

/// Configuration for the RMS-based energy scorer.
#[derive(Debug, Clone, Copy)]
pub struct EnergyScorerConfig {
    /// Frame stride in seconds.
    pub frame_size: f32,
    /// Sample rate of the input signal in Hz.
    pub sample_rate: u32,
    /// RMS level mapped to probability 1.0; lower levels scale linearly.
    pub reference_level: f32,
}

impl Default for EnergyScorerConfig {
    fn default() -> Self {
        Self {
            frame_size: defaults::FRAME_SIZE,
            sample_rate: defaults::SAMPLE_RATE,
            reference_level: defaults::SCORE_REFERENCE_LEVEL,
        }
    }
}

/// Energy-based frame scorer.
///
/// Maps per-frame RMS linearly into `[0, 1]` against a reference level.
/// Not a substitute for a trained VAD, but deterministic and dependency-free,
/// which makes it the default source for tests and the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyScorer {
    config: EnergyScorerConfig,
}

impl EnergyScorer {
    /// Creates a new energy scorer with the given configuration.
    pub fn new(config: EnergyScorerConfig) -> Self {
        Self { config }
    }
}

impl FrameScoreSource for EnergyScorer {
    fn score(&self, audio: &[f32]) -> Result<Vec<FrameScore>> {
        let frame_samples =
            ((self.config.frame_size * self.config.sample_rate as f32) as usize).max(1);
        let n_frames = audio.len().div_ceil(frame_samples);

        let mut scores = Vec::with_capacity(n_frames);
        for idx in 0..n_frames {
            let lo = idx * frame_samples;
            let hi = (lo + frame_samples).min(audio.len());
            let rms = calculate_rms(&audio[lo..hi]);
            let probability = (rms / self.config.reference_level).clamp(0.0, 1.0);
            scores.push(FrameScore::new(
                probability,
                idx as f32 * self.config.frame_size,
                (idx + 1) as f32 * self.config.frame_size,
            ));
        }
        Ok(scores)
    }
}

/// Frame-score source returning a preset sequence, for tests.
#[derive(Debug, Clone, Default)]
pub struct MockScoreSource {
    scores: Vec<FrameScore>,
}

impl MockScoreSource {
    /// Creates a mock source that returns the given scores for any input.
    pub fn new(scores: Vec<FrameScore>) -> Self {
        Self { scores }
    }

    /// Builds uniform-stride scores from bare probabilities.
    pub fn from_probabilities(probs: &[f32], frame_size: f32) -> Self {
        let scores = probs
            .iter()
            .enumerate()
            .map(|(i, &p)| FrameScore::new(p, i as f32 * frame_size, (i + 1) as f32 * frame_size))
            .collect();
        Self { scores }
    }
}

impl FrameScoreSource for MockScoreSource {
    fn score(&self, _audio: &[f32]) -> Result<Vec<FrameScore>> {
        Ok(self.scores.clone())
    }
}

/// Calculates the Root Mean Square (RMS) of normalized audio samples.
///
/// Returns 0.0 for an empty slice.
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_silence_is_zero() {
        let silence = vec![0.0f32; 1000];
        assert_eq!(calculate_rms(&silence), 0.0);
    }

    #[test]
    fn test_rms_full_scale() {
        let signal = vec![1.0f32; 1000];
        let rms = calculate_rms(&signal);
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {}", rms);
    }

    #[test]
    fn test_rms_negative_samples() {
        let signal = vec![-0.5f32; 1000];
        let rms = calculate_rms(&signal);
        assert!(
            (rms - 0.5).abs() < 0.001,
            "RMS should be ~0.5 for -0.5 signal, got {}",
            rms
        );
    }

    #[test]
    fn test_rms_empty_samples() {
        let empty: Vec<f32> = vec![];
        assert_eq!(calculate_rms(&empty), 0.0);
    }

    #[test]
    fn test_energy_scorer_covers_full_signal() {
        let scorer = EnergyScorer::default();
        // 1.5 frames worth of audio at 16kHz / 20ms
        let audio = vec![0.1f32; 480];
        let scores = scorer.score(&audio).unwrap();

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].start, 0.0);
        assert!((scores[0].end - 0.02).abs() < f32::EPSILON);
        assert!((scores[1].start - 0.02).abs() < f32::EPSILON);
    }

    #[test]
    fn test_energy_scorer_empty_audio() {
        let scorer = EnergyScorer::default();
        let scores = scorer.score(&[]).unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn test_energy_scorer_loud_frame_scores_high() {
        let scorer = EnergyScorer::default();
        let audio = vec![0.2f32; 320];
        let scores = scorer.score(&audio).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].probability, 1.0);
    }

    #[test]
    fn test_energy_scorer_quiet_frame_scores_low() {
        let scorer = EnergyScorer::default();
        let audio = vec![0.001f32; 320];
        let scores = scorer.score(&audio).unwrap();
        assert!(scores[0].probability < defaults::BOS_THRESHOLD);
    }

    #[test]
    fn test_mock_source_from_probabilities() {
        let source = MockScoreSource::from_probabilities(&[0.1, 0.9], 0.02);
        let scores = source.score(&[]).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].probability, 0.1);
        assert!((scores[1].start - 0.02).abs() < f32::EPSILON);
        assert!((scores[1].end - 0.04).abs() < f32::EPSILON);
    }
}
