//! Collating work items into uniform batches.
//!
//! Two padding concerns live here: the time axis (every audio buffer in a
//! batch shares one length) and the prompt axis (every prompt in a batch
//! shares one length, with control tokens right-aligned).

use crate::batch::types::{Batch, BatchItem, WorkItem};
use crate::defaults;
use crate::error::{BatchscribeError, Result};
use crate::vocab::PromptVocabulary;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Configuration for the batching stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Default number of items per batch.
    pub batch_size: usize,
    /// Maximum summed speech duration of a stitched unit, in seconds.
    pub max_speech_len: f32,
    /// Split stitched units at internal silences of at least this many
    /// seconds. `None` keeps gaps elided inside units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_silent_region: Option<f32>,
    /// Group detected segments into multi-segment units. When false each
    /// detected segment becomes its own unit.
    pub merge_chunks: bool,
    /// Pad each batch only to its own longest item plus this margin
    /// (seconds), instead of the full context window.
    pub use_dynamic_time_axis: bool,
    /// Margin in seconds for dynamic time-axis padding.
    pub dta_padding: f32,
    /// Suppress timestamp tokens in the prompt.
    pub without_timestamps: bool,
    /// Maximum initial-prompt tokens kept per request.
    pub max_initial_prompt_len: usize,
    /// Number of batches dispatched to the engine concurrently. Keep at 1
    /// unless the engine documents support for overlapping calls.
    pub max_in_flight: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            max_speech_len: defaults::MAX_SEG_LEN,
            max_silent_region: None,
            merge_chunks: true,
            use_dynamic_time_axis: false,
            dta_padding: defaults::DTA_PADDING_SECS,
            without_timestamps: true,
            max_initial_prompt_len: defaults::MAX_INITIAL_PROMPT_LEN,
            max_in_flight: 1,
        }
    }
}

impl BatcherConfig {
    /// Validates the configuration, rejecting degenerate values.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.max_speech_len <= 0.0 {
            return Err(invalid("max_speech_len", "must be positive"));
        }
        if self.dta_padding < 0.0 {
            return Err(invalid("dta_padding", "must not be negative"));
        }
        if let Some(gap) = self.max_silent_region
            && gap < 0.0
        {
            return Err(invalid("max_silent_region", "must not be negative"));
        }
        if self.max_in_flight == 0 {
            return Err(invalid("max_in_flight", "must be at least 1"));
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

/// Pads with zeros or truncates a sample buffer to an exact length.
pub fn pad_or_trim(mut audio: Vec<f32>, length: usize) -> Vec<f32> {
    if audio.len() > length {
        audio.truncate(length);
    } else {
        audio.resize(length, 0.0);
    }
    audio
}

/// Collates work items into batches.
#[derive(Clone)]
pub struct Collator {
    config: BatcherConfig,
    vocab: Arc<dyn PromptVocabulary>,
}

impl Collator {
    /// Creates a collator, validating the configuration.
    pub fn new(config: BatcherConfig, vocab: Arc<dyn PromptVocabulary>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, vocab })
    }

    /// Returns the configuration this collator was built from.
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Lazily chunks items into batches of at most `batch_size`.
    ///
    /// The final batch may be smaller; an empty input yields no batches.
    /// Item order is preserved, so each request's units stay in emission
    /// order across the batch stream.
    pub fn collate(&self, items: Vec<WorkItem>, batch_size: usize) -> Result<Batches<'_>> {
        if batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        Ok(Batches {
            collator: self,
            batch_size,
            items: items.into(),
            next_index: 0,
        })
    }

    /// Builds one batch from a slice of items: time-axis padding plus
    /// prompt collation.
    fn collate_batch(&self, items: Vec<WorkItem>, index: u64) -> Batch {
        let target_len = if self.config.use_dynamic_time_axis {
            let longest = items.iter().map(|i| i.audio.len()).max().unwrap_or(0);
            let margin = (self.config.dta_padding * defaults::SAMPLE_RATE as f32) as usize;
            (longest + margin).min(defaults::MAX_CONTEXT_SAMPLES)
        } else {
            defaults::MAX_CONTEXT_SAMPLES
        };

        let context_max = items
            .iter()
            .map(|i| i.context_tokens.len())
            .max()
            .unwrap_or(0);

        let collated = items
            .into_iter()
            .map(|item| {
                let prompt = if context_max > 0 {
                    let mut prompt = Vec::with_capacity(1 + context_max + item.control_tokens.len());
                    prompt.push(self.vocab.previous_context_token());
                    prompt.extend(std::iter::repeat_n(
                        self.vocab.silent_token(),
                        context_max - item.context_tokens.len(),
                    ));
                    prompt.extend_from_slice(&item.context_tokens);
                    prompt.extend_from_slice(&item.control_tokens);
                    prompt
                } else {
                    item.control_tokens.clone()
                };

                let seq_len = item.audio.len();
                BatchItem {
                    request_id: item.request_id,
                    unit: item.unit,
                    audio: pad_or_trim(item.audio, target_len),
                    seq_len,
                    prompt,
                    context_tokens: item.context_tokens,
                    language: item.language,
                }
            })
            .collect();

        Batch {
            index,
            items: collated,
        }
    }
}

/// Lazy, finite, non-restartable batch stream.
pub struct Batches<'a> {
    collator: &'a Collator,
    batch_size: usize,
    items: VecDeque<WorkItem>,
    next_index: u64,
}

impl Iterator for Batches<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.items.is_empty() {
            return None;
        }
        let take = self.batch_size.min(self.items.len());
        let chunk: Vec<WorkItem> = self.items.drain(..take).collect();
        let batch = self.collator.collate_batch(chunk, self.next_index);
        self.next_index += 1;
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{SpeechSegment, StitchedUnit};
    use crate::vocab::{StaticVocabulary, Task};

    fn vocab() -> Arc<dyn PromptVocabulary> {
        Arc::new(StaticVocabulary)
    }

    fn control() -> Vec<u32> {
        StaticVocabulary
            .control_tokens(Task::Transcribe, "en")
            .unwrap()
    }

    fn item(request_id: u32, samples: usize, context: Vec<u32>) -> WorkItem {
        WorkItem {
            request_id,
            unit: StitchedUnit::new(vec![SpeechSegment::new(0.0, 1.0)]),
            audio: vec![0.5; samples],
            language: "en".to_string(),
            control_tokens: control(),
            context_tokens: context,
        }
    }

    #[test]
    fn test_pad_or_trim_pads_with_zeros() {
        let padded = pad_or_trim(vec![1.0, 2.0], 4);
        assert_eq!(padded, vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pad_or_trim_truncates() {
        let trimmed = pad_or_trim(vec![1.0, 2.0, 3.0], 2);
        assert_eq!(trimmed, vec![1.0, 2.0]);
    }

    #[test]
    fn test_batches_chunk_and_final_partial() {
        let collator = Collator::new(BatcherConfig::default(), vocab()).unwrap();
        let items: Vec<WorkItem> = (0..5).map(|i| item(i, 100, vec![])).collect();

        let batches: Vec<Batch> = collator.collate(items, 2).unwrap().collect();

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[2].len(), 1);
        assert_eq!(batches[0].index, 0);
        assert_eq!(batches[2].index, 2);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let collator = Collator::new(BatcherConfig::default(), vocab()).unwrap();
        let batches: Vec<Batch> = collator.collate(vec![], 4).unwrap().collect();
        assert!(batches.is_empty());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let collator = Collator::new(BatcherConfig::default(), vocab()).unwrap();
        assert!(collator.collate(vec![], 0).is_err());
    }

    #[test]
    fn test_fixed_padding_fills_context_window() {
        let collator = Collator::new(BatcherConfig::default(), vocab()).unwrap();
        let items = vec![item(0, 1000, vec![])];

        let batches: Vec<Batch> = collator.collate(items, 1).unwrap().collect();
        let batch_item = &batches[0].items[0];

        assert_eq!(batch_item.audio.len(), defaults::MAX_CONTEXT_SAMPLES);
        assert_eq!(batch_item.seq_len, 1000);
    }

    #[test]
    fn test_dynamic_padding_uses_batch_maximum() {
        let config = BatcherConfig {
            use_dynamic_time_axis: true,
            dta_padding: 1.0,
            ..Default::default()
        };
        let collator = Collator::new(config, vocab()).unwrap();
        let items = vec![item(0, 8000, vec![]), item(0, 4000, vec![])];

        let batches: Vec<Batch> = collator.collate(items, 2).unwrap().collect();

        // longest (8000) + 1s margin (16000) = 24000, under the window
        for batch_item in &batches[0].items {
            assert_eq!(batch_item.audio.len(), 24_000);
        }
    }

    #[test]
    fn test_dynamic_padding_capped_at_context_window() {
        let config = BatcherConfig {
            use_dynamic_time_axis: true,
            dta_padding: 3.0,
            ..Default::default()
        };
        let collator = Collator::new(config, vocab()).unwrap();
        let items = vec![item(0, defaults::MAX_CONTEXT_SAMPLES - 100, vec![])];

        let batches: Vec<Batch> = collator.collate(items, 1).unwrap().collect();
        assert_eq!(
            batches[0].items[0].audio.len(),
            defaults::MAX_CONTEXT_SAMPLES
        );
    }

    #[test]
    fn test_oversized_audio_truncated_to_window() {
        let collator = Collator::new(BatcherConfig::default(), vocab()).unwrap();
        let items = vec![item(0, defaults::MAX_CONTEXT_SAMPLES + 5000, vec![])];

        let batches: Vec<Batch> = collator.collate(items, 1).unwrap().collect();
        assert_eq!(
            batches[0].items[0].audio.len(),
            defaults::MAX_CONTEXT_SAMPLES
        );
    }

    #[test]
    fn test_prompts_without_context_are_bare_control() {
        let collator = Collator::new(BatcherConfig::default(), vocab()).unwrap();
        let items = vec![item(0, 100, vec![]), item(1, 100, vec![])];

        let batches: Vec<Batch> = collator.collate(items, 2).unwrap().collect();

        for batch_item in &batches[0].items {
            assert_eq!(batch_item.prompt, control());
        }
    }

    #[test]
    fn test_prompt_left_padding_right_aligns_control() {
        let collator = Collator::new(BatcherConfig::default(), vocab()).unwrap();
        let items = vec![
            item(0, 100, vec![7, 8, 9]),
            item(1, 100, vec![5]),
            item(2, 100, vec![]),
        ];

        let batches: Vec<Batch> = collator.collate(items, 3).unwrap().collect();
        let batch = &batches[0];
        let voc = StaticVocabulary;

        // All prompts share one length.
        let len = batch.items[0].prompt.len();
        assert!(batch.items.iter().all(|i| i.prompt.len() == len));

        // sot_prev leads, control trails at the same offset everywhere.
        for batch_item in &batch.items {
            assert_eq!(batch_item.prompt[0], voc.previous_context_token());
            assert_eq!(batch_item.prompt[len - 3..], control()[..]);
        }

        // The short context is left-padded with the filler.
        assert_eq!(
            batch.items[1].prompt[1..3],
            [voc.silent_token(), voc.silent_token()]
        );
        assert_eq!(batch.items[1].prompt[3], 5);

        // The full context sits flush against the control tokens.
        assert_eq!(batch.items[0].prompt[1..4], [7, 8, 9]);
    }

    #[test]
    fn test_item_order_preserved_across_batches() {
        let collator = Collator::new(BatcherConfig::default(), vocab()).unwrap();
        let items: Vec<WorkItem> = (0..7).map(|i| item(i, 10, vec![])).collect();

        let batches: Vec<Batch> = collator.collate(items, 3).unwrap().collect();
        let ids: Vec<u32> = batches
            .iter()
            .flat_map(|b| b.items.iter().map(|i| i.request_id))
            .collect();

        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_config_validation() {
        assert!(BatcherConfig::default().validate().is_ok());

        let bad = BatcherConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = BatcherConfig {
            max_speech_len: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = BatcherConfig {
            max_in_flight: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
