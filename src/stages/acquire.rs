//! Acquire stage: fetch a source as MP3 into the audio directory.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::AcquireConfig;
use crate::process::{run_command, CommandError};

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("download of {source_ref} failed: {source}")]
    Download {
        source_ref: String,
        #[source]
        source: CommandError,
    },

    #[error("downloader reported no audio file for {source_ref} (stdout: {stdout:?})")]
    NoOutput { source_ref: String, stdout: String },

    #[error("trimming {} to {secs} s failed: {source}", .path.display())]
    Trim {
        path: PathBuf,
        secs: f64,
        #[source]
        source: CommandError,
    },

    #[error("file operation on {} failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fetches a source reference into `audio_dir`.
pub trait Acquirer: Send + Sync {
    /// Download `source`, keeping only the first `trim_secs` seconds when
    /// given.  Returns the path of the acquired file inside `audio_dir`.
    fn acquire(
        &self,
        source: &str,
        trim_secs: Option<f64>,
        audio_dir: &Path,
    ) -> Result<PathBuf, AcquireError>;
}

// ---------------------------------------------------------------------------
// YtDlpAcquirer
// ---------------------------------------------------------------------------

/// yt-dlp download with MP3 extraction, plus an ffmpeg re-encode for trims.
#[derive(Debug, Clone)]
pub struct YtDlpAcquirer {
    config: AcquireConfig,
}

impl YtDlpAcquirer {
    pub fn new(config: AcquireConfig) -> Self {
        Self { config }
    }

    pub fn download_args(&self, source: &str, audio_dir: &Path) -> Vec<String> {
        let template = audio_dir.join("%(title)s.%(ext)s");
        let mut args: Vec<String> = [
            "--format",
            "bestaudio/best",
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(self.config.audio_quality.clone());
        args.extend(
            [
                "--restrict-filenames",
                "--no-playlist",
                "--no-warnings",
                "--no-progress",
                "--print",
                "after_move:filepath",
                "--output",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        args.push(template.to_string_lossy().into_owned());
        args.push(source.to_string());
        args
    }

    pub fn trim_args(&self, input: &Path, secs: f64, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
            "-t".into(),
            format!("{secs:.3}"),
            "-vn".into(),
            "-c:a".into(),
            "libmp3lame".into(),
            "-b:a".into(),
            self.config.audio_quality.clone(),
            output.to_string_lossy().into_owned(),
        ]
    }

    /// Keep the first `secs` seconds of `path`, in place.
    fn trim(&self, path: &Path, secs: f64) -> Result<(), AcquireError> {
        let staged = path.with_extension("trim.mp3");
        let args = self.trim_args(path, secs, &staged);
        if let Err(source) = run_command(&self.config.ffmpeg, &args, None) {
            let _ = fs::remove_file(&staged);
            return Err(AcquireError::Trim {
                path: path.to_path_buf(),
                secs,
                source,
            });
        }
        fs::rename(&staged, path).map_err(|source| AcquireError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("acquire: trimmed {} to {secs} s", path.display());
        Ok(())
    }
}

/// The downloaded file path: the last non-empty stdout line.
pub fn reported_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(PathBuf::from)
}

impl Acquirer for YtDlpAcquirer {
    fn acquire(
        &self,
        source: &str,
        trim_secs: Option<f64>,
        audio_dir: &Path,
    ) -> Result<PathBuf, AcquireError> {
        log::info!("acquire: downloading {source}");
        let args = self.download_args(source, audio_dir);
        let output = run_command(&self.config.program, &args, None).map_err(|source_err| {
            AcquireError::Download {
                source_ref: source.to_string(),
                source: source_err,
            }
        })?;

        let path = reported_path(&output.stdout)
            .filter(|p| p.is_file())
            .ok_or_else(|| AcquireError::NoOutput {
                source_ref: source.to_string(),
                stdout: output.stdout.trim().to_string(),
            })?;
        log::info!("acquire: saved {}", path.display());

        if let Some(secs) = trim_secs {
            self.trim(&path, secs)?;
        }
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn acquirer() -> YtDlpAcquirer {
        YtDlpAcquirer::new(AcquireConfig::default())
    }

    #[test]
    fn download_args_request_mp3_without_playlists() {
        let args = acquirer().download_args("https://youtu.be/x", Path::new("/w/audio"));
        let joined = args.join(" ");

        assert!(joined.contains("--audio-format mp3"));
        assert!(joined.contains("--audio-quality 192K"));
        assert!(joined.contains("--no-playlist"));
        assert!(joined.contains("--restrict-filenames"));
        assert!(joined.contains("--output /w/audio/%(title)s.%(ext)s"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
    }

    #[test]
    fn trim_args_limit_duration() {
        let args = acquirer().trim_args(Path::new("a.mp3"), 90.0, Path::new("a.trim.mp3"));
        let t = args.iter().position(|a| a == "-t").expect("-t");
        assert_eq!(args[t + 1], "90.000");
        assert_eq!(args.last().map(String::as_str), Some("a.trim.mp3"));
    }

    #[test]
    fn reported_path_takes_last_line() {
        let stdout = "\n/w/audio/First.mp3\n/w/audio/Song_Title.mp3\n\n";
        assert_eq!(
            reported_path(stdout),
            Some(PathBuf::from("/w/audio/Song_Title.mp3"))
        );
        assert_eq!(reported_path("  \n"), None);
    }

    #[test]
    fn missing_downloader_is_download_error() {
        let config = AcquireConfig {
            program: "definitely-not-yt-dlp-4711".into(),
            ..AcquireConfig::default()
        };
        let dir = tempfile::tempdir().expect("temp dir");
        let err = YtDlpAcquirer::new(config)
            .acquire("https://youtu.be/x", None, dir.path())
            .unwrap_err();
        assert!(matches!(
            err,
            AcquireError::Download {
                source: CommandError::Missing { .. },
                ..
            }
        ));
    }

    #[test]
    fn failed_trim_is_trim_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("song.mp3");
        fs::write(&path, b"not audio").expect("write");
        let config = AcquireConfig {
            ffmpeg: "definitely-not-ffmpeg-4711".into(),
            ..AcquireConfig::default()
        };

        let err = YtDlpAcquirer::new(config).trim(&path, 30.0).unwrap_err();
        assert!(matches!(err, AcquireError::Trim { secs, .. } if secs == 30.0));
        assert!(path.exists());
    }
}
