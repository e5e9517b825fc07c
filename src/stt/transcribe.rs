//! Transcription parameters and segment type.

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Owned mirror of `whisper_rs::SamplingStrategy`.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    Greedy {
        best_of: i32,
    },
    BeamSearch {
        beam_size: i32,
        /// whisper.cpp uses `-1.0` for "no patience limit".
        patience: f32,
    },
}

impl Default for SamplingStrategy {
    /// Beam search of width 5, the same decoding the reference whisper CLI
    /// uses for full-song transcription.
    fn default() -> Self {
        Self::BeamSearch {
            beam_size: 5,
            patience: -1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscribeParams
// ---------------------------------------------------------------------------

/// Settings for one whisper run.  Language and model are configuration,
/// never per-call input.
///
/// ```
/// use karaoke_pipeline::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "en".into(),
///     ..TranscribeParams::default()
/// };
/// assert!(params.use_gpu);
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 code, or `"auto"` for detection.
    pub language: String,
    pub strategy: SamplingStrategy,
    pub n_threads: i32,
    pub use_gpu: bool,
    /// Suppress whisper.cpp progress output on stderr.
    pub suppress_progress: bool,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "pt".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            use_gpu: true,
            suppress_progress: true,
        }
    }
}

/// Available parallelism, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One time-stamped chunk of transcribed text.  Times are seconds from the
/// start of the audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    /// Build from whisper.cpp timestamps, which count centiseconds.
    pub fn from_centiseconds(text: impl Into<String>, t0: i64, t1: i64) -> Self {
        Self {
            text: text.into(),
            start: t0.max(0) as f64 / 100.0,
            end: t1.max(0) as f64 / 100.0,
        }
    }
}
