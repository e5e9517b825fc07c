//! Resumable stage orchestration.
//!
//! # Architecture
//!
//! ```text
//! RunRequest { entry, name, source, trim, background image, lyrics }
//!        │
//!        ▼
//! PipelineOrchestrator::run()  ← async, one stage at a time
//!        │
//!        ├─ 1 Acquire          Acquirer        → audio/{name}.mp3
//!        ├─ 2 Separate         Separator       → audio_separated/{name}/
//!        ├─ 3 Transcribe       Transcriber     → subtitle_srt/{name}.srt
//!        │                     [SubtitleCorrector, optional]
//!        ├─ 4 Align+Synthesize Aligner         → subtitle_ass/{name}.ass
//!        └─ 5 Render           Renderer        → karaokes_completos/{name}_karaoke.mp4
//!
//! Inputs of a stage that did not run in this invocation come from
//! ArtifactResolver.
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use karaoke_pipeline::artifacts::ArtifactNamespace;
//! use karaoke_pipeline::config::AppConfig;
//! use karaoke_pipeline::pipeline::{Collaborators, PipelineOrchestrator, RunRequest, Stage};
//! use karaoke_pipeline::stages::{CommandAligner, DemucsSeparator, FfmpegRenderer, YtDlpAcquirer};
//! use karaoke_pipeline::stt::{TranscribeParams, WhisperEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let collaborators = Collaborators {
//!         acquirer: Arc::new(YtDlpAcquirer::new(config.acquire.clone())),
//!         separator: Arc::new(DemucsSeparator::new(config.separation.clone())),
//!         transcriber: Arc::new(WhisperEngine::new("ggml-large-v3.bin", TranscribeParams::default())),
//!         aligner: Arc::new(CommandAligner::new(config.align.clone())),
//!         renderer: Arc::new(FfmpegRenderer::new(config.render.clone())),
//!         corrector: None,
//!     };
//!     let orchestrator = PipelineOrchestrator::new(ArtifactNamespace::new("."), collaborators);
//!
//!     let request = RunRequest {
//!         name: Some("song1".into()),
//!         ..RunRequest::new(Stage::Transcribe, "karaoke-hugo.jpg")
//!     };
//!     let video = orchestrator.run(request).await.unwrap();
//!     println!("{}", video.display());
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{Collaborators, PipelineError, PipelineOrchestrator, RunRequest};
pub use state::{PipelineState, Stage};
