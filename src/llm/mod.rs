//! Optional subtitle correction against reference lyrics.
//!
//! * [`SubtitleCorrector`]: async trait implemented by correction backends.
//! * [`ApiCorrector`]: Gemini or OpenAI-compatible HTTP backend.
//! * [`FallbackCorrector`]: keeps the uncorrected subtitle on any failure.
//! * [`PromptBuilder`]: the correction prompt.
//!
//! ```rust,no_run
//! use karaoke_pipeline::config::AppConfig;
//! use karaoke_pipeline::llm::{ApiCorrector, FallbackCorrector};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let corrector = FallbackCorrector::new(ApiCorrector::from_config(&config.llm));
//!
//!     let srt = std::fs::read_to_string("subtitle_srt/song1.srt").unwrap();
//!     let lyrics = std::fs::read_to_string("lyrics/song1.txt").unwrap();
//!     let fixed = corrector.correct_or_keep(&srt, &lyrics).await;
//!     println!("{fixed}");
//! }
//! ```

pub mod corrector;
pub mod fallback;
pub mod prompt;

pub use corrector::{ApiCorrector, LlmError, SubtitleCorrector};
pub use fallback::FallbackCorrector;
pub use prompt::PromptBuilder;
