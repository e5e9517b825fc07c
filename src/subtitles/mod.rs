//! Subtitle formats produced by the pipeline.
//!
//! * [`srt`]: segment-level SubRip subtitles written by the Transcribe stage.
//! * [`karaoke`]: word-highlighted `.ass` subtitles written by the
//!   Align + Synthesize stage.

pub mod karaoke;
pub mod srt;

use thiserror::Error;

pub use karaoke::{
    format_ass_time, highlight_centiseconds, karaoke_text, render_ass, AlignedLine, AlignedWord,
    ASS_HEADER,
};
pub use srt::{format_srt_time, parse_srt_time, SegmentSubtitle, SrtEntry};

/// Errors raised while reading subtitle files.
#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("malformed subtitle at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("subtitle I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
