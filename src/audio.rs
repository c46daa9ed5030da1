//! Audio decoding and slicing helpers.
//!
//! The pipeline works on mono f32 samples normalized to [-1, 1] at 16kHz.
//! Raw request payloads arrive as 16-bit little-endian PCM bytes; WAV files
//! are read through `hound`.

use crate::error::{BatchscribeError, Result};
use crate::segment::StitchedUnit;
use std::io::Read;
use std::path::Path;

/// Decodes 16-bit little-endian PCM bytes into normalized f32 samples.
///
/// # Errors
/// Returns `InvalidAudioInput` for an odd byte count. An empty payload
/// decodes to an empty sample vector; downstream stages fall back to the
/// silence segment rather than faulting.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        return Err(BatchscribeError::InvalidAudioInput {
            message: format!("odd PCM byte count: {}", bytes.len()),
        });
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect())
}

/// Reads a mono 16kHz 16-bit WAV into normalized f32 samples.
pub fn read_wav(path: &Path) -> Result<Vec<f32>> {
    let file = std::fs::File::open(path)?;
    read_wav_from(file)
}

/// Reads WAV data from any reader; see [`read_wav`].
pub fn read_wav_from<R: Read>(reader: R) -> Result<Vec<f32>> {
    let mut wav = hound::WavReader::new(reader).map_err(|e| BatchscribeError::AudioDecode {
        message: format!("not a valid WAV stream: {}", e),
    })?;
    let spec = wav.spec();

    if spec.channels != 1 || spec.sample_rate != crate::defaults::SAMPLE_RATE {
        return Err(BatchscribeError::AudioDecode {
            message: format!(
                "expected mono {}Hz, got {} channel(s) at {}Hz",
                crate::defaults::SAMPLE_RATE,
                spec.channels,
                spec.sample_rate
            ),
        });
    }
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(BatchscribeError::AudioDecode {
            message: format!("expected 16-bit integer samples, got {:?}", spec),
        });
    }

    wav.samples::<i16>()
        .map(|s| {
            s.map(|v| v as f32 / 32768.0)
                .map_err(|e| BatchscribeError::AudioDecode {
                    message: format!("sample read failed: {}", e),
                })
        })
        .collect()
}

/// Duration of a sample buffer in seconds at the given rate.
pub fn duration_secs(samples: &[f32], sample_rate: u32) -> f32 {
    samples.len() as f32 / sample_rate as f32
}

/// Gathers a unit's audio by concatenating its sub-segment slices.
///
/// Silence between sub-segments is elided. Slice bounds are clamped to the
/// signal, so padded segment edges never read out of range.
pub fn slice_unit(audio: &[f32], unit: &StitchedUnit, sample_rate: u32) -> Vec<f32> {
    let mut out = Vec::new();
    for seg in &unit.segments {
        let lo = ((seg.start * sample_rate as f32) as usize).min(audio.len());
        let hi = ((seg.end * sample_rate as f32) as usize).min(audio.len());
        if lo < hi {
            out.extend_from_slice(&audio[lo..hi]);
        }
    }
    out
}
