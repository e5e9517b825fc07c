//! Command-line surface of the `karaoke` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;
use crate::pipeline::{PipelineError, RunRequest, Stage};

/// Turn a media source into a karaoke video, resuming at any stage.
///
/// Stages: 1 acquire, 2 separate, 3 transcribe, 4 align, 5 render.
#[derive(Debug, Clone, Parser)]
#[command(name = "karaoke", version, about)]
pub struct Cli {
    /// Source to download (URL or anything the downloader accepts).
    /// Required when starting at stage 1.
    pub source: Option<String>,

    /// Stage to start from.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub stage: u8,

    /// Project name.  Defaults to the downloaded file name at stage 1 and to
    /// the newest file in `audio/` otherwise.
    #[arg(long)]
    pub name: Option<String>,

    /// Keep only the first SECS seconds of the downloaded audio (stage 1).
    #[arg(long, value_name = "SECS", value_parser = parse_trim_secs)]
    pub trim: Option<f64>,

    /// Background image for the video (stage 5).
    #[arg(long, value_name = "PATH")]
    pub background_image: Option<PathBuf>,

    /// Reference lyrics used to correct the transcription (stage 3).
    #[arg(long, value_name = "PATH")]
    pub lyrics: Option<PathBuf>,

    /// Workspace directory holding the artifact folders.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Settings file instead of the platform default.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the effective settings to the settings file and exit.
    #[arg(long)]
    pub write_config: bool,
}

fn parse_trim_secs(value: &str) -> Result<f64, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("trim must be a positive number of seconds, got {value}"))
    }
}

impl Cli {
    /// Workspace root: `--root`, else `workspace.root` from the settings.
    pub fn workspace_root(&self, config: &AppConfig) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| config.workspace.root.clone())
    }

    pub fn to_request(&self, config: &AppConfig) -> Result<RunRequest, PipelineError> {
        let entry = Stage::from_index(self.stage).ok_or(PipelineError::InvalidEntryStage(self.stage))?;
        if entry != Stage::Acquire && self.trim.is_some() {
            log::warn!("--trim only applies at stage 1; ignoring it");
        }
        let background_image = self
            .background_image
            .clone()
            .unwrap_or_else(|| config.workspace.background_image.clone());

        Ok(RunRequest {
            entry,
            name: self.name.clone(),
            source: self.source.clone(),
            trim_secs: self.trim.filter(|_| entry == Stage::Acquire),
            background_image,
            lyrics: self.lyrics.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("karaoke").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_to_stage_one() {
        let cli = parse(&["https://youtu.be/abc"]).expect("parse");
        let request = cli.to_request(&AppConfig::default()).expect("request");

        assert_eq!(request.entry, Stage::Acquire);
        assert_eq!(request.source.as_deref(), Some("https://youtu.be/abc"));
        assert_eq!(request.background_image, PathBuf::from("karaoke-hugo.jpg"));
        assert_eq!(request.name, None);
    }

    #[test]
    fn resume_flags_map_to_request() {
        let cli = parse(&[
            "--stage",
            "3",
            "--name",
            "song1",
            "--background-image",
            "bg.png",
            "--lyrics",
            "song1.txt",
        ])
        .expect("parse");
        let request = cli.to_request(&AppConfig::default()).expect("request");

        assert_eq!(request.entry, Stage::Transcribe);
        assert_eq!(request.name.as_deref(), Some("song1"));
        assert_eq!(request.background_image, PathBuf::from("bg.png"));
        assert_eq!(request.lyrics, Some(PathBuf::from("song1.txt")));
        assert_eq!(request.source, None);
    }

    #[test]
    fn stage_outside_range_is_rejected() {
        assert!(parse(&["--stage", "0"]).is_err());
        assert!(parse(&["--stage", "6"]).is_err());
    }

    #[test]
    fn trim_must_be_positive() {
        assert!(parse(&["x", "--trim", "-3"]).is_err());
        assert!(parse(&["x", "--trim", "abc"]).is_err());
        let cli = parse(&["x", "--trim", "45.5"]).expect("parse");
        assert_eq!(cli.trim, Some(45.5));
    }

    #[test]
    fn trim_is_dropped_after_stage_one() {
        let cli = parse(&["--stage", "2", "--trim", "30"]).expect("parse");
        let request = cli.to_request(&AppConfig::default()).expect("request");
        assert_eq!(request.trim_secs, None);
    }

    #[test]
    fn root_flag_overrides_settings() {
        let config = AppConfig::default();
        assert_eq!(parse(&[]).expect("parse").workspace_root(&config), config.workspace.root);
        assert_eq!(
            parse(&["--root", "/srv/karaoke"])
                .expect("parse")
                .workspace_root(&config),
            PathBuf::from("/srv/karaoke")
        );
    }
}
