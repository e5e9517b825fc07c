//! WAV decoding into interleaved `f32` buffers.
//!
//! Stems written by the separator are plain PCM or IEEE-float WAV files.
//! Every supported sample format is normalised to `[-1.0, 1.0]`.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::mix::MixError;

/// Interleaved multi-channel audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples, `frames * channels` long.
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    /// Raw little-endian `f32` bytes, the layout ffmpeg reads as `f32le`.
    pub fn to_f32le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 4);
        for s in &self.samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }
}

/// Read a WAV file and normalise its samples to `f32`.
///
/// # Errors
///
/// [`MixError::Wav`] when the file cannot be opened or decoded, or uses a
/// sample format other than 8/16/24/32-bit integer or 32-bit float.
pub fn read_wav(path: &Path) -> Result<AudioBuffer, MixError> {
    let wav_err = |source: hound::Error| MixError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_err)?,
        SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample).ok_or(MixError::Wav {
                path: path.to_path_buf(),
                source: hound::Error::Unsupported,
            })?;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(wav_err)?
        }
    };

    Ok(AudioBuffer {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// Write `buffer` as a 32-bit float WAV file.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in &buffer.samples {
        writer.write_sample(s)?;
    }
    writer.finalize()
}

fn int_scale(bits: u16) -> Option<f32> {
    match bits {
        8 => Some(128.0),
        16 => Some(32_768.0),
        24 => Some(8_388_608.0),
        32 => Some(2_147_483_648.0),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reads_16_bit_pcm_normalised() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("pcm16.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).expect("create");
        for v in [0i16, 16_384, -32_768] {
            writer.write_sample(v).expect("write");
        }
        writer.finalize().expect("finalize");

        let buf = read_wav(&path).expect("read");
        assert_eq!(buf.channels, 1);
        assert_eq!(buf.sample_rate, 8_000);
        assert_eq!(buf.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn float_round_trip_keeps_layout() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("float.wav");
        let original = AudioBuffer {
            samples: vec![0.25, -0.25, 0.5, -0.5],
            channels: 2,
            sample_rate: 44_100,
        };
        write_wav(&path, &original).expect("write");

        let loaded = read_wav(&path).expect("read");
        assert_eq!(loaded, original);
        assert_eq!(loaded.frames(), 2);
    }

    #[test]
    fn missing_file_is_wav_error() {
        let err = read_wav(Path::new("/nonexistent/stem.wav")).unwrap_err();
        assert!(matches!(err, MixError::Wav { .. }));
    }

    #[test]
    fn f32le_bytes_are_little_endian() {
        let buf = AudioBuffer {
            samples: vec![1.0],
            channels: 1,
            sample_rate: 1,
        };
        assert_eq!(buf.to_f32le_bytes(), 1.0f32.to_le_bytes().to_vec());
        assert_eq!(buf.duration_secs(), 1.0);
    }
}
