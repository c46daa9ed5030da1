//! Speech segmentation: frame scores in, inference-sized units out.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ frame scores │───▶│   detector   │───▶│   stitcher   │───▶ stitched units
//! │  (from VAD)  │    │ (hysteresis, │    │  (greedy by  │
//! └──────────────┘    │ merge, split)│    │ speech time) │
//!                     └──────────────┘    └──────────────┘
//! ```

pub mod detector;
pub mod stitcher;
pub mod types;

pub use detector::{DetectorConfig, SegmentDetector};
pub use stitcher::stitch;
pub use types::{SpeechSegment, StitchedUnit};
