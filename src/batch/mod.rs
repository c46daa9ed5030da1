//! Batching: stitched units from many requests collated into uniform
//! inference batches.

pub mod collator;
pub mod types;

pub use collator::{BatcherConfig, Batches, Collator, pad_or_trim};
pub use types::{Batch, BatchItem, WorkItem};
