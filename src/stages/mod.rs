//! The five stage functions and their external collaborators.
//!
//! | Stage | Collaborator trait | Production implementation |
//! |---|---|---|
//! | Acquire | [`Acquirer`] | [`YtDlpAcquirer`] |
//! | Separate | [`Separator`] | [`DemucsSeparator`] |
//! | Transcribe | [`crate::stt::Transcriber`] | [`crate::stt::WhisperEngine`] |
//! | Align + Synthesize | [`Aligner`] | [`CommandAligner`] |
//! | Render | [`Renderer`] | [`FfmpegRenderer`] |
//!
//! All collaborator traits are blocking and object-safe; the orchestrator
//! holds them as `Arc<dyn …>` and drives them from `spawn_blocking`.

pub mod acquire;
pub mod align;
pub mod render;
pub mod separate;

use thiserror::Error;

pub use acquire::{AcquireError, Acquirer, YtDlpAcquirer};
pub use align::{
    fit_lines, synthesize_word_subtitle, AlignError, AlignedSegment, Aligner, CommandAligner,
    WordTiming,
};
pub use render::{render_video, FfmpegRenderer, MuxJob, RenderError, RenderInputs, Renderer};
pub use separate::{DemucsSeparator, SeparateError, Separator};

use crate::stt::SttError;
use crate::subtitles::SubtitleError;

/// Failure of a single stage, wrapping the collaborator's own error.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Separate(#[from] SeparateError),

    #[error(transparent)]
    Transcribe(#[from] SttError),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Subtitle(#[from] SubtitleError),

    #[error("file operation on {} failed: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking task running the collaborator panicked or was cancelled.
    #[error("stage task aborted: {0}")]
    Join(String),
}
