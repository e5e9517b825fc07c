//! Conversion of decoded stems into Whisper input.
//!
//! whisper.cpp only accepts **16 kHz mono `f32`**.  Separated stems arrive at
//! the separator's native rate (44.1 kHz stereo for demucs), so the vocals
//! stem goes through [`downmix_to_mono`] and [`resample_linear`] before
//! transcription.

use super::wav::AudioBuffer;

/// Sample rate expected by whisper.cpp.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Average interleaved channels into a single channel.
///
/// `channels == 0` yields an empty vector; mono input is copied unchanged.
/// A trailing partial frame is dropped.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample mono `samples` from `from_rate` to `to_rate` with linear
/// interpolation.
///
/// The output holds `ceil(len * to_rate / from_rate)` samples.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let pos = i as f64 / ratio;
            let idx = pos as usize;
            if idx >= last {
                return samples[last.min(idx)];
            }
            let frac = (pos - idx as f64) as f32;
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        })
        .collect()
}

/// Convert a decoded buffer into 16 kHz mono samples for whisper.
pub fn to_whisper_input(buffer: &AudioBuffer) -> Vec<f32> {
    let mono = downmix_to_mono(&buffer.samples, buffer.channels);
    resample_linear(&mono, buffer.sample_rate, WHISPER_SAMPLE_RATE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
