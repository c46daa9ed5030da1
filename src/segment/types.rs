//! Segment data types shared by the detector and the stitcher.

use serde::{Deserialize, Serialize};

/// A contiguous region of detected speech, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechSegment {
    /// Start time in seconds.
    pub start: f32,
    /// End time in seconds.
    pub end: f32,
}

impl SpeechSegment {
    /// Creates a new speech segment.
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Returns the segment duration in seconds.
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

/// A group of speech segments transcribed as one inference unit.
///
/// The unit's audio is the concatenation of its sub-segments; silence
/// between sub-segments is elided, so word timings coming back from the
/// model are relative to the concatenated audio and must be re-based
/// (see the reassembly module).
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedUnit {
    /// Sub-segments in time order, non-overlapping.
    pub segments: Vec<SpeechSegment>,
}

impl StitchedUnit {
    /// Creates a unit from time-ordered sub-segments.
    ///
    /// # Panics
    /// Panics if `segments` is empty.
    pub fn new(segments: Vec<SpeechSegment>) -> Self {
        assert!(!segments.is_empty(), "a stitched unit needs segments");
        Self { segments }
    }

    /// Wall-clock start of the unit in seconds.
    pub fn start(&self) -> f32 {
        self.segments[0].start
    }

    /// Wall-clock end of the unit in seconds.
    pub fn end(&self) -> f32 {
        self.segments[self.segments.len() - 1].end
    }

    /// Total speech duration in seconds, excluding elided silence.
    pub fn speech_duration(&self) -> f32 {
        self.segments.iter().map(SpeechSegment::duration).sum()
    }
}
