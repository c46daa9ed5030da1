//! Stitching detected segments into inference-sized units.
//!
//! Groups segments greedily by summed speech duration so that many short
//! utterances share one model call. Silence between segments inside a unit
//! is elided from the unit's audio and does not count against the cap.

use crate::segment::types::{SpeechSegment, StitchedUnit};

/// Groups time-ordered segments into units of bounded speech duration.
///
/// The greedy pass closes a unit as soon as adding the next segment would
/// push the summed speech duration past `max_len`; a single segment longer
/// than `max_len` still forms its own unit.
///
/// When `max_silent_region` is given, a second pass walks each unit's
/// sub-segments: consecutive sub-segments separated by less than the
/// threshold are merged into one wall-clock span (the silence is kept in
/// the audio), and any gap at or above the threshold closes the unit and
/// starts a new one.
pub fn stitch(
    segments: &[SpeechSegment],
    max_len: f32,
    max_silent_region: Option<f32>,
) -> Vec<StitchedUnit> {
    if segments.is_empty() {
        return Vec::new();
    }

    let mut units: Vec<StitchedUnit> = Vec::new();
    let mut current = vec![segments[0]];
    let mut speech_duration = segments[0].duration();

    for seg in &segments[1..] {
        if speech_duration + seg.duration() > max_len {
            units.push(StitchedUnit::new(current));
            current = vec![*seg];
            speech_duration = seg.duration();
        } else {
            speech_duration += seg.duration();
            current.push(*seg);
        }
    }
    units.push(StitchedUnit::new(current));

    let Some(threshold) = max_silent_region else {
        return units;
    };

    // Re-merge wall-clock spans across tolerable gaps; an intolerable gap
    // closes the unit.
    let mut joined: Vec<StitchedUnit> = Vec::new();
    for unit in units {
        let mut span = unit.segments[0];
        for seg in &unit.segments[1..] {
            if seg.start - span.end >= threshold {
                joined.push(StitchedUnit::new(vec![span]));
                span = *seg;
            } else {
                span.end = seg.end;
            }
        }
        joined.push(StitchedUnit::new(vec![span]));
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f32, end: f32) -> SpeechSegment {
        SpeechSegment::new(start, end)
    }

    #[test]
    fn test_empty_input_yields_no_units() {
        assert!(stitch(&[], 29.0, None).is_empty());
    }

    #[test]
    fn test_single_segment_single_unit() {
        let units = stitch(&[seg(1.0, 2.0)], 29.0, None);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].segments, vec![seg(1.0, 2.0)]);
    }

    #[test]
    fn test_greedy_grouping_by_speech_duration() {
        // 10s + 10s fit under 25s; the third 10s segment starts a new unit.
        let segments = [seg(0.0, 10.0), seg(20.0, 30.0), seg(40.0, 50.0)];
        let units = stitch(&segments, 25.0, None);

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].segments.len(), 2);
        assert_eq!(units[1].segments.len(), 1);
    }

    #[test]
    fn test_silence_inside_unit_does_not_count() {
        // Wall-clock span is 40s but speech is only 4s, so one unit.
        let segments = [seg(0.0, 2.0), seg(38.0, 40.0)];
        let units = stitch(&segments, 10.0, None);

        assert_eq!(units.len(), 1);
        assert!((units[0].speech_duration() - 4.0).abs() < 1e-6);
        assert_eq!(units[0].start(), 0.0);
        assert_eq!(units[0].end(), 40.0);
    }

    #[test]
    fn test_no_unit_exceeds_speech_cap() {
        let segments: Vec<SpeechSegment> = (0..20)
            .map(|i| seg(i as f32 * 5.0, i as f32 * 5.0 + 3.0))
            .collect();
        let units = stitch(&segments, 10.0, None);

        for unit in &units {
            assert!(unit.speech_duration() <= 10.0 + 1e-6);
        }
    }

    #[test]
    fn test_oversized_single_segment_keeps_own_unit() {
        let segments = [seg(0.0, 15.0), seg(20.0, 21.0)];
        let units = stitch(&segments, 10.0, None);

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].segments, vec![seg(0.0, 15.0)]);
    }

    #[test]
    fn test_small_gap_merges_into_one_unit() {
        let segments = [seg(1.0, 2.0), seg(2.3, 3.0)];
        let units = stitch(&segments, 10.0, Some(0.6));

        assert_eq!(units.len(), 1);
        // Gap of 0.3 < 0.6: the span keeps the silence.
        assert_eq!(units[0].segments, vec![seg(1.0, 3.0)]);
    }

    #[test]
    fn test_large_gap_splits_into_two_units() {
        let segments = [seg(1.0, 2.0), seg(2.3, 3.0)];
        let units = stitch(&segments, 10.0, Some(0.1));

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].segments, vec![seg(1.0, 2.0)]);
        assert_eq!(units[1].segments, vec![seg(2.3, 3.0)]);
    }

    #[test]
    fn test_gap_pass_mixes_merge_and_split() {
        let segments = [seg(0.0, 1.0), seg(1.2, 2.0), seg(5.0, 6.0), seg(6.1, 7.0)];
        let units = stitch(&segments, 29.0, Some(0.5));

        assert_eq!(units.len(), 2);
        assert_eq!(units[0].segments, vec![seg(0.0, 2.0)]);
        assert_eq!(units[1].segments, vec![seg(5.0, 7.0)]);
    }

    #[test]
    fn test_units_emitted_in_time_order() {
        let segments: Vec<SpeechSegment> = (0..8)
            .map(|i| seg(i as f32 * 10.0, i as f32 * 10.0 + 8.0))
            .collect();
        let units = stitch(&segments, 16.0, None);

        for pair in units.windows(2) {
            assert!(pair[0].end() <= pair[1].start());
        }
    }
}
