//! Transcriber trait and the whisper.cpp implementation.
//!
//! [`Transcriber`] is object-safe and `Send + Sync` so the orchestrator can
//! hold it as `Arc<dyn Transcriber>` and call it from `spawn_blocking`.
//!
//! [`WhisperEngine`] loads its GGML model on each call rather than at
//! construction, so runs that enter the pipeline after the Transcribe stage
//! never pay for loading a multi-gigabyte model.

use std::path::{Path, PathBuf};

use thiserror::Error;
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use crate::audio::{read_wav, to_whisper_input, MixError, WHISPER_SAMPLE_RATE};
use crate::stt::transcribe::{SamplingStrategy, Segment, TranscribeParams};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SttError {
    #[error("whisper model not found: {0}")]
    ModelNotFound(String),

    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    /// Less than 0.5 s of audio after conversion to 16 kHz.
    #[error("audio too short: {} ({samples} samples at 16 kHz)", .path.display())]
    AudioTooShort { path: PathBuf, samples: usize },

    #[error("cannot read audio: {0}")]
    Audio(#[from] MixError),
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Speech-to-text over an audio file.
///
/// Returns segments in time order.  Callers normalise them into subtitle
/// entries, so implementations may return raw model output.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>, SttError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn Transcriber>) {}
};

/// 0.5 s at 16 kHz.
const MIN_AUDIO_SAMPLES: usize = 8_000;

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct WhisperEngine {
    model_path: PathBuf,
    params: TranscribeParams,
}

impl WhisperEngine {
    pub fn new(model_path: impl Into<PathBuf>, params: TranscribeParams) -> Self {
        Self {
            model_path: model_path.into(),
            params,
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn load_context(&self) -> Result<WhisperContext, SttError> {
        let path = self.model_path.as_path();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(self.params.use_gpu);

        log::info!(
            "stt: loading {} (gpu: {})",
            path.display(),
            self.params.use_gpu
        );
        WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))
    }

    /// Run whisper over 16 kHz mono samples.
    pub fn transcribe_samples(
        &self,
        ctx: &WhisperContext,
        audio: &[f32],
    ) -> Result<Vec<Segment>, SttError> {
        use whisper_rs::SamplingStrategy as WS;
        let ws = match self.params.strategy {
            SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
            SamplingStrategy::BeamSearch {
                beam_size,
                patience,
            } => WS::BeamSearch {
                beam_size,
                patience,
            },
        };

        let mut fp = FullParams::new(ws);
        let lang: Option<&str> = if self.params.language == "auto" {
            None
        } else {
            Some(self.params.language.as_str())
        };
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
        }

        let mut state = ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let wall_start = std::time::Instant::now();
        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut segments = Vec::with_capacity(n_segments.max(0) as usize);
        for i in 0..n_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            let t0 = state.full_get_segment_t0(i).unwrap_or(0);
            let t1 = state.full_get_segment_t1(i).unwrap_or(0);
            segments.push(Segment::from_centiseconds(text, t0, t1));
        }

        log::info!(
            "stt: {} segment(s) from {:.1} s of audio in {:.1} s",
            segments.len(),
            audio.len() as f64 / WHISPER_SAMPLE_RATE as f64,
            wall_start.elapsed().as_secs_f64()
        );
        Ok(segments)
    }
}

impl Transcriber for WhisperEngine {
    fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>, SttError> {
        let buffer = read_wav(audio)?;
        let samples = to_whisper_input(&buffer);
        if samples.len() < MIN_AUDIO_SAMPLES {
            return Err(SttError::AudioTooShort {
                path: audio.to_path_buf(),
                samples: samples.len(),
            });
        }
        let ctx = self.load_context()?;
        self.transcribe_samples(&ctx, &samples)
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// Test double returning fixed segments and recording every input path.
#[cfg(test)]
pub struct MockTranscriber {
    response: Result<Vec<Segment>, String>,
    calls: std::sync::Mutex<Vec<PathBuf>>,
}

#[cfg(test)]
impl MockTranscriber {
    pub fn ok(segments: Vec<Segment>) -> Self {
        Self {
            response: Ok(segments),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[cfg(test)]
impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>, SttError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(audio.to_path_buf());
        self.response.clone().map_err(SttError::Transcription)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
