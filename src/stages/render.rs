//! Render stage: instrumental backing track + background image + karaoke
//! subtitle muxed into the final video.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::audio::{AudioBuffer, InstrumentalCombiner, MixError};
use crate::config::RenderConfig;
use crate::process::{run_command, run_command_with_input, CommandError};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Mix(#[from] MixError),

    #[error("exporting the instrumental mix failed: {0}")]
    Export(#[source] CommandError),

    #[error("probing audio duration failed: {0}")]
    Probe(#[source] CommandError),

    #[error("ffprobe reported an unusable duration {0:?}")]
    InvalidDuration(String),

    #[error("video encoding failed: {0}")]
    Encode(#[source] CommandError),
}

/// Inputs of the final mux.
#[derive(Debug, Clone, PartialEq)]
pub struct MuxJob {
    pub image: PathBuf,
    pub audio: PathBuf,
    pub subtitle: PathBuf,
    pub duration_secs: f64,
    pub output: PathBuf,
}

/// Audio export, probing and video muxing.
pub trait Renderer: Send + Sync {
    /// Encode `mix` to `output` at the configured bitrate.
    fn export_mix(&self, mix: &AudioBuffer, output: &Path) -> Result<(), RenderError>;

    fn probe_duration(&self, audio: &Path) -> Result<f64, RenderError>;

    fn mux(&self, job: &MuxJob) -> Result<(), RenderError>;
}

// ---------------------------------------------------------------------------
// FfmpegRenderer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    config: RenderConfig,
}

impl FfmpegRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn export_args(&self, mix: &AudioBuffer, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-f".into(),
            "f32le".into(),
            "-ar".into(),
            mix.sample_rate.to_string(),
            "-ac".into(),
            mix.channels.to_string(),
            "-i".into(),
            "pipe:0".into(),
            "-c:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            self.config.audio_bitrate.clone(),
            output.to_string_lossy().into_owned(),
        ]
    }

    pub fn mux_args(&self, job: &MuxJob) -> Vec<String> {
        let filter = format!(
            "scale={}:-2,format=yuv420p,ass={}",
            self.config.width,
            escape_filter_path(&job.subtitle)
        );
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-loop".into(),
            "1".into(),
            "-i".into(),
            job.image.to_string_lossy().into_owned(),
            "-i".into(),
            job.audio.to_string_lossy().into_owned(),
            "-t".into(),
            format!("{:.3}", job.duration_secs),
            "-vf".into(),
            filter,
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            self.config.audio_bitrate.clone(),
        ];
        args.extend(self.config.video_args.iter().cloned());
        args.push("-shortest".into());
        args.push(job.output.to_string_lossy().into_owned());
        args
    }
}

/// Escape a path for use as a filtergraph option value.  Two levels apply:
/// the option value (`\ : '`) and then the filtergraph (`\ ' [ ] , ;`).
pub fn escape_filter_path(path: &Path) -> String {
    fn escape(input: &str, special: &[char]) -> String {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            if special.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }
    let value = escape(&path.to_string_lossy(), &['\\', ':', '\'']);
    escape(&value, &['\\', '\'', '[', ']', ',', ';'])
}

pub fn parse_duration(stdout: &str) -> Result<f64, RenderError> {
    let raw = stdout.trim();
    match raw.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(secs),
        _ => Err(RenderError::InvalidDuration(raw.to_string())),
    }
}

impl Renderer for FfmpegRenderer {
    fn export_mix(&self, mix: &AudioBuffer, output: &Path) -> Result<(), RenderError> {
        let args = self.export_args(mix, output);
        run_command_with_input(&self.config.ffmpeg, &args, mix.to_f32le_bytes())
            .map_err(RenderError::Export)?;
        log::info!(
            "render: instrumental mix ({:.1} s) written to {}",
            mix.duration_secs(),
            output.display()
        );
        Ok(())
    }

    fn probe_duration(&self, audio: &Path) -> Result<f64, RenderError> {
        let args: Vec<String> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            audio.to_string_lossy().into_owned(),
        ];
        let output = run_command(&self.config.ffprobe, &args, None).map_err(RenderError::Probe)?;
        parse_duration(&output.stdout)
    }

    fn mux(&self, job: &MuxJob) -> Result<(), RenderError> {
        log::info!("render: encoding {}", job.output.display());
        run_command(&self.config.ffmpeg, &self.mux_args(job), None).map_err(RenderError::Encode)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stage driver
// ---------------------------------------------------------------------------

/// Deletes the file at its path when dropped.
struct TransientFile(PathBuf);

impl Drop for TransientFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.0) {
            Ok(()) => log::debug!("render: removed {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("render: could not remove {}: {e}", self.0.display()),
        }
    }
}

/// Paths used by one render.
#[derive(Debug, Clone)]
pub struct RenderInputs<'a> {
    pub stem_dir: &'a Path,
    pub subtitle: &'a Path,
    pub image: &'a Path,
    /// Transient combined instrumental, removed before returning.
    pub instrumental: &'a Path,
    pub output: &'a Path,
}

/// Combine the instrumental stems, mux the video and remove the transient
/// instrumental whatever the outcome.
pub fn render_video(
    renderer: &dyn Renderer,
    combiner: &InstrumentalCombiner,
    inputs: &RenderInputs<'_>,
) -> Result<(), RenderError> {
    let _transient = TransientFile(inputs.instrumental.to_path_buf());
    let mix = combiner.combine(inputs.stem_dir)?;
    renderer.export_mix(&mix, inputs.instrumental)?;
    let duration_secs = renderer.probe_duration(inputs.instrumental)?;

    renderer.mux(&MuxJob {
        image: inputs.image.to_path_buf(),
        audio: inputs.instrumental.to_path_buf(),
        subtitle: inputs.subtitle.to_path_buf(),
        duration_secs,
        output: inputs.output.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
