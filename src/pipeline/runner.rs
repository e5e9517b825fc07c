//! Pipeline orchestrator: drives the stages from the entry stage to Render.
//!
//! # Pipeline flow
//!
//! ```text
//! run(RunRequest)
//!   ├─ stage 1 without a source → MissingSource (nothing touched)
//!   ├─ create the five artifact directories
//!   └─ for stage in entry..=Render
//!        ├─ inputs: fresh output of this run, else ArtifactResolver
//!        ├─ spawn_blocking(collaborator)          [Running(stage)]
//!        └─ write the stage's artifact
//!   first failure → Aborted(stage), error carries stage + project
//! ```
//!
//! Stages run one at a time.  Collaborators are blocking and are pushed onto
//! `tokio::task::spawn_blocking`; only subtitle correction is natively async.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use crate::artifacts::{
    ArtifactError, ArtifactKind, ArtifactNamespace, ArtifactResolver, VOCALS_STEM,
};
use crate::audio::InstrumentalCombiner;
use crate::llm::{FallbackCorrector, SubtitleCorrector};
use crate::stages::{
    render_video, synthesize_word_subtitle, Acquirer, Aligner, RenderInputs, Renderer, Separator,
    StageError,
};
use crate::stt::Transcriber;
use crate::subtitles::SegmentSubtitle;

use super::state::{PipelineState, Stage};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Project label used in errors raised before a project name is known.
pub const UNNAMED_PROJECT: &str = "<unnamed>";

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Stage 1 needs a source reference to download.
    #[error("stage 1 (acquire) requires a source reference")]
    MissingSource,

    #[error("invalid entry stage {0}: expected 1..=5")]
    InvalidEntryStage(u8),

    /// A predecessor artifact required by `stage` does not exist.
    #[error("stage {stage}: {kind} artifact not found for project '{project}'")]
    ArtifactNotFound {
        stage: Stage,
        kind: ArtifactKind,
        project: String,
    },

    /// The resolver could not run (no project to infer, unreadable dir).
    /// `project` is [`UNNAMED_PROJECT`] when the name was still being inferred.
    #[error("stage {stage} failed for project '{project}': {source}")]
    Resolve {
        stage: Stage,
        project: String,
        #[source]
        source: ArtifactError,
    },

    #[error(
        "stage {stage} failed for project '{project}': background image {} does not exist",
        .path.display()
    )]
    BackgroundImageNotFound {
        stage: Stage,
        project: String,
        path: PathBuf,
    },

    #[error("stage {stage} failed for project '{project}': {source}")]
    Stage {
        stage: Stage,
        project: String,
        #[source]
        source: StageError,
    },

    #[error("cannot prepare artifact directories under {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Collaborators / RunRequest
// ---------------------------------------------------------------------------

/// The external collaborators each stage delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub acquirer: Arc<dyn Acquirer>,
    pub separator: Arc<dyn Separator>,
    pub transcriber: Arc<dyn Transcriber>,
    pub aligner: Arc<dyn Aligner>,
    pub renderer: Arc<dyn Renderer>,
    /// `None` disables correction even when lyrics are supplied.
    pub corrector: Option<Arc<dyn SubtitleCorrector>>,
}

/// Parameters of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub entry: Stage,
    /// Explicit project name; inferred when absent.
    pub name: Option<String>,
    /// Source reference for Acquire.
    pub source: Option<String>,
    /// Keep only the first N seconds of the acquired audio.
    pub trim_secs: Option<f64>,
    pub background_image: PathBuf,
    /// Reference lyrics for subtitle correction.
    pub lyrics: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(entry: Stage, background_image: impl Into<PathBuf>) -> Self {
        Self {
            entry,
            name: None,
            source: None,
            trim_secs: None,
            background_image: background_image.into(),
            lyrics: None,
        }
    }
}

/// Artifacts produced or resolved so far in the current run.
#[derive(Debug, Default)]
struct RunContext {
    project: Option<String>,
    source_audio: Option<PathBuf>,
    stem_dir: Option<PathBuf>,
    segment_subtitle: Option<PathBuf>,
    word_subtitle: Option<PathBuf>,
    video: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

pub struct PipelineOrchestrator {
    resolver: ArtifactResolver,
    collaborators: Collaborators,
    combiner: InstrumentalCombiner,
    state: Mutex<PipelineState>,
}

impl PipelineOrchestrator {
    pub fn new(namespace: ArtifactNamespace, collaborators: Collaborators) -> Self {
        Self {
            resolver: ArtifactResolver::new(namespace),
            collaborators,
            combiner: InstrumentalCombiner::new(),
            state: Mutex::new(PipelineState::Pending),
        }
    }

    pub fn namespace(&self) -> &ArtifactNamespace {
        self.resolver.namespace()
    }

    /// State of the current or most recent run.
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run every stage from `request.entry` through Render and return the
    /// final video path.
    ///
    /// # Errors
    ///
    /// The first failing stage aborts the run.  Artifacts written by earlier
    /// stages stay on disk so the run can be resumed at the failing stage.
    pub async fn run(&self, request: RunRequest) -> Result<PathBuf, PipelineError> {
        let has_source = request
            .source
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        if request.entry == Stage::Acquire && !has_source {
            return Err(PipelineError::MissingSource);
        }

        let namespace = self.namespace();
        namespace
            .ensure_dirs()
            .map_err(|source| PipelineError::Io {
                path: namespace.root().to_path_buf(),
                source,
            })?;

        self.set_state(PipelineState::Pending);
        let mut ctx = RunContext {
            project: request.name.clone().filter(|n| !n.trim().is_empty()),
            ..RunContext::default()
        };

        for stage in request.entry.through_render() {
            self.update_state(|s| {
                s.enter(stage);
            });
            log::info!("stage {stage}: starting");

            let result = match stage {
                Stage::Acquire => self.acquire(&request, &mut ctx).await,
                Stage::Separate => self.separate(&mut ctx).await,
                Stage::Transcribe => self.transcribe(&request, &mut ctx).await,
                Stage::AlignSynthesize => self.align(&mut ctx).await,
                Stage::Render => self.render(&request, &mut ctx).await,
            };

            if let Err(err) = result {
                self.update_state(PipelineState::abort);
                log::error!("stage {stage}: {err}");
                return Err(err);
            }
        }

        self.update_state(|s| {
            s.complete();
        });
        let project = ctx.project.clone().unwrap_or_default();
        ctx.video.ok_or(PipelineError::ArtifactNotFound {
            stage: Stage::Render,
            kind: ArtifactKind::FinalVideo,
            project,
        })
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn acquire(&self, request: &RunRequest, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let source = request
            .source
            .clone()
            .ok_or(PipelineError::MissingSource)?;
        let label = ctx.project.clone().unwrap_or_else(|| source.clone());

        let acquirer = Arc::clone(&self.collaborators.acquirer);
        let audio_dir = self.namespace().dir(ArtifactKind::SourceAudio);
        let trim = request.trim_secs;
        let fetched = run_blocking(Stage::Acquire, &label, move || {
            acquirer.acquire(&source, trim, &audio_dir)
        })
        .await?;

        let project = match &ctx.project {
            Some(name) => name.clone(),
            None => fetched
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let canonical = self
            .namespace()
            .canonical_path(&project, ArtifactKind::SourceAudio);
        if fetched != canonical {
            move_file(&fetched, &canonical).map_err(|source| PipelineError::Stage {
                stage: Stage::Acquire,
                project: project.clone(),
                source: StageError::Io {
                    path: canonical.clone(),
                    source,
                },
            })?;
        }

        log::info!(
            "stage {}: project '{project}' audio at {}",
            Stage::Acquire,
            canonical.display()
        );
        ctx.project = Some(project);
        ctx.source_audio = Some(canonical);
        Ok(())
    }

    async fn separate(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let stage = Stage::Separate;
        let project = self.project(stage, ctx)?;
        let audio = self.input(stage, &project, ArtifactKind::SourceAudio, &ctx.source_audio)?;
        let stem_dir = self.namespace().canonical_path(&project, ArtifactKind::StemSet);

        let separator = Arc::clone(&self.collaborators.separator);
        let out = stem_dir.clone();
        run_blocking(stage, &project, move || separator.separate(&audio, &out)).await?;

        log::info!("stage {stage}: stems in {}", stem_dir.display());
        ctx.stem_dir = Some(stem_dir);
        Ok(())
    }

    async fn transcribe(&self, request: &RunRequest, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let stage = Stage::Transcribe;
        let project = self.project(stage, ctx)?;
        let stem_dir = self.input(stage, &project, ArtifactKind::StemSet, &ctx.stem_dir)?;
        let vocals = stem_dir.join(VOCALS_STEM);

        let transcriber = Arc::clone(&self.collaborators.transcriber);
        let segments =
            run_blocking(stage, &project, move || transcriber.transcribe(&vocals)).await?;

        let subtitle = SegmentSubtitle::from_segments(&segments);
        if subtitle.is_empty() {
            log::warn!("stage {stage}: transcription produced no subtitle entries");
        }
        let mut text = subtitle.compose();
        if let Some(lyrics) = &request.lyrics {
            text = self.correct(text, lyrics).await;
        }

        let srt = self
            .namespace()
            .canonical_path(&project, ArtifactKind::SegmentSubtitle);
        fs::write(&srt, text).map_err(|source| PipelineError::Stage {
            stage,
            project: project.clone(),
            source: StageError::Io {
                path: srt.clone(),
                source,
            },
        })?;

        log::info!(
            "stage {stage}: {} entries written to {}",
            subtitle.len(),
            srt.display()
        );
        ctx.segment_subtitle = Some(srt);
        Ok(())
    }

    /// Correct `subtitle` against the lyrics file; any problem keeps the
    /// uncorrected text.
    async fn correct(&self, subtitle: String, lyrics: &Path) -> String {
        let Some(corrector) = &self.collaborators.corrector else {
            log::warn!("lyrics supplied but subtitle correction is disabled");
            return subtitle;
        };
        let reference = match tokio::fs::read_to_string(lyrics).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!(
                    "cannot read lyrics {}: {e}; keeping uncorrected subtitle",
                    lyrics.display()
                );
                return subtitle;
            }
        };
        FallbackCorrector::new(Arc::clone(corrector))
            .correct_or_keep(&subtitle, &reference)
            .await
    }

    async fn align(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let stage = Stage::AlignSynthesize;
        let project = self.project(stage, ctx)?;
        let srt = self.input(
            stage,
            &project,
            ArtifactKind::SegmentSubtitle,
            &ctx.segment_subtitle,
        )?;
        let stem_dir = self.input(stage, &project, ArtifactKind::StemSet, &ctx.stem_dir)?;
        let vocals = stem_dir.join(VOCALS_STEM);
        let ass = self.namespace().canonical_path(&project, ArtifactKind::WordSubtitle);

        let aligner = Arc::clone(&self.collaborators.aligner);
        let out = ass.clone();
        let lines = run_blocking(stage, &project, move || {
            synthesize_word_subtitle(aligner.as_ref(), &srt, &vocals, &out)
        })
        .await?;

        log::info!("stage {stage}: {lines} karaoke lines in {}", ass.display());
        ctx.stem_dir = Some(stem_dir);
        ctx.word_subtitle = Some(ass);
        Ok(())
    }

    async fn render(&self, request: &RunRequest, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let stage = Stage::Render;
        let project = self.project(stage, ctx)?;
        let stem_dir = self.input(stage, &project, ArtifactKind::StemSet, &ctx.stem_dir)?;
        let subtitle = self.input(stage, &project, ArtifactKind::WordSubtitle, &ctx.word_subtitle)?;
        if !request.background_image.is_file() {
            return Err(PipelineError::BackgroundImageNotFound {
                stage,
                project,
                path: request.background_image.clone(),
            });
        }

        let namespace = self.namespace();
        let instrumental = namespace.instrumental_temp_path(&project);
        let output = namespace.canonical_path(&project, ArtifactKind::FinalVideo);

        let renderer = Arc::clone(&self.collaborators.renderer);
        let combiner = self.combiner;
        let image = request.background_image.clone();
        let video = output.clone();
        run_blocking(stage, &project, move || {
            render_video(
                renderer.as_ref(),
                &combiner,
                &RenderInputs {
                    stem_dir: &stem_dir,
                    subtitle: &subtitle,
                    image: &image,
                    instrumental: &instrumental,
                    output: &video,
                },
            )
        })
        .await?;

        log::info!("stage {stage}: karaoke video at {}", output.display());
        ctx.video = Some(output);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The project name, inferred from the newest source audio when the run
    /// started after Acquire without an explicit name.
    fn project(&self, stage: Stage, ctx: &mut RunContext) -> Result<String, PipelineError> {
        if let Some(name) = &ctx.project {
            return Ok(name.clone());
        }
        let audio = self
            .resolver
            .resolve(None, ArtifactKind::SourceAudio)
            .map_err(|e| resolve_error(stage, UNNAMED_PROJECT, e))?;
        let name = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!(
            "stage {stage}: no project name given, using '{name}' from {}",
            audio.display()
        );
        ctx.project = Some(name.clone());
        ctx.source_audio = Some(audio);
        Ok(name)
    }

    /// Input artifact of `kind`: this run's fresh output when there is one,
    /// otherwise whatever the resolver finds from earlier runs.
    fn input(
        &self,
        stage: Stage,
        project: &str,
        kind: ArtifactKind,
        fresh: &Option<PathBuf>,
    ) -> Result<PathBuf, PipelineError> {
        if let Some(path) = fresh {
            log::info!("stage {stage}: {kind} from this run: {}", path.display());
            return Ok(path.clone());
        }
        let path = self
            .resolver
            .resolve(Some(project), kind)
            .map_err(|e| resolve_error(stage, project, e))?;
        log::info!("stage {stage}: {kind} resolved: {}", path.display());
        Ok(path)
    }

    fn set_state(&self, state: PipelineState) {
        self.update_state(|s| *s = state);
    }

    fn update_state(&self, f: impl FnOnce(&mut PipelineState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

fn resolve_error(stage: Stage, project: &str, err: ArtifactError) -> PipelineError {
    match err {
        ArtifactError::NotFound { kind, project } => PipelineError::ArtifactNotFound {
            stage,
            kind,
            project,
        },
        other => PipelineError::Resolve {
            stage,
            project: project.to_owned(),
            source: other,
        },
    }
}

/// Run a blocking collaborator call on the blocking pool and attach the
/// stage and project to its error.
async fn run_blocking<T, E, F>(stage: Stage, project: &str, f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<StageError> + Send + 'static,
{
    let source = match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => e.into(),
        Err(e) => StageError::Join(e.to_string()),
    };
    Err(PipelineError::Stage {
        stage,
        project: project.to_string(),
        source,
    })
}

/// Rename `from` to `to`, replacing `to`; copies across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
