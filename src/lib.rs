//! Resumable media-to-karaoke pipeline.
//!
//! A project moves through five stages, each persisting one artifact under a
//! workspace root:
//!
//! ```text
//! 1 acquire     audio/{name}.mp3
//! 2 separate    audio_separated/{name}/{stem}.wav
//! 3 transcribe  subtitle_srt/{name}.srt
//! 4 align       subtitle_ass/{name}.ass
//! 5 render      karaokes_completos/{name}_karaoke.mp4
//! ```
//!
//! A run may start at any stage; inputs that were not produced in the same
//! run are located by [`artifacts::ArtifactResolver`].

pub mod artifacts;
pub mod audio;
pub mod cli;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod process;
pub mod stages;
pub mod stt;
pub mod subtitles;
