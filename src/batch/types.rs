//! Data types flowing through the batching stage.

use crate::segment::StitchedUnit;
use crate::vocab::TokenId;

/// One stitched unit of one request, ready for collation.
///
/// Produced by the service per unit, in unit order within each request;
/// that order must survive collation for reassembly to work.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Batch-local id of the originating request.
    pub request_id: u32,
    /// The stitched unit, kept for time restoration and word re-basing.
    pub unit: StitchedUnit,
    /// Concatenated sub-segment audio (gaps elided), unpadded.
    pub audio: Vec<f32>,
    /// Language code of the request.
    pub language: String,
    /// Start-of-transcript control sequence for the request's task/language.
    pub control_tokens: Vec<TokenId>,
    /// Truncated initial-prompt tokens, empty when no prompt was given.
    pub context_tokens: Vec<TokenId>,
}

/// A collated item inside one batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Batch-local id of the originating request.
    pub request_id: u32,
    /// The stitched unit this item transcribes.
    pub unit: StitchedUnit,
    /// Audio padded (or truncated) to the batch's common length.
    pub audio: Vec<f32>,
    /// Sample count before padding.
    pub seq_len: usize,
    /// Full prompt: filler-padded context plus right-aligned control tokens.
    pub prompt: Vec<TokenId>,
    /// Unpadded context tokens, for engines that take context separately.
    pub context_tokens: Vec<TokenId>,
    /// Language code of the request.
    pub language: String,
}

/// One inference call's worth of items.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Emission index; reassembly consumes batches in this order.
    pub index: u64,
    /// Items in collation order.
    pub items: Vec<BatchItem>,
}

impl Batch {
    /// Number of items in the batch.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the batch holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
