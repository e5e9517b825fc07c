//! Speech-to-text for the Transcribe stage.
//!
//! ```text
//! vocals.wav ──read_wav──▶ to_whisper_input (16 kHz mono)
//!                               │
//!            ModelPaths ──▶ WhisperEngine ──▶ Vec<Segment>
//! ```

pub mod engine;
pub mod model;
pub mod transcribe;

pub use engine::{SttError, Transcriber, WhisperEngine};
pub use model::{find_model_by_id, ModelInfo, ModelPaths, WHISPER_MODELS};
pub use transcribe::{SamplingStrategy, Segment, TranscribeParams};

#[cfg(test)]
pub use engine::MockTranscriber;
