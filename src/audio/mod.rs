//! Audio handling for separated stems.
//!
//! ```text
//! audio_separated/{name}/*.wav ──read_wav──▶ AudioBuffer
//!        │                                     │
//!        ├─ vocals.wav ──to_whisper_input──▶ 16 kHz mono ──▶ stt
//!        └─ other stems ──InstrumentalCombiner──▶ backing track ──▶ render
//! ```

pub mod mix;
pub mod resample;
pub mod wav;

pub use mix::{InstrumentalCombiner, MixError};
pub use resample::{downmix_to_mono, resample_linear, to_whisper_input, WHISPER_SAMPLE_RATE};
pub use wav::{read_wav, write_wav, AudioBuffer};
