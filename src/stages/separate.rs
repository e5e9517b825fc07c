//! Separate stage: split source audio into stems.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::artifacts::VOCALS_STEM;
use crate::config::SeparationConfig;
use crate::process::{command_exists, run_command, CommandError};

#[derive(Debug, Error)]
pub enum SeparateError {
    /// The configured acceleration device is not present.
    #[error("separation device {device} unavailable: {detail}")]
    DeviceUnavailable { device: String, detail: String },

    #[error("separation failed: {0}")]
    Separation(#[source] CommandError),

    #[error("separator produced no vocals.wav in {}", .0.display())]
    MissingVocals(PathBuf),

    #[error("file operation on {} failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SeparateError + '_ {
    move |source| SeparateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes the stems of `audio` into `stem_dir` as `{stem}.wav`, with a
/// [`VOCALS_STEM`] member and at least one instrumental member.
pub trait Separator: Send + Sync {
    fn separate(&self, audio: &Path, stem_dir: &Path) -> Result<(), SeparateError>;
}

// ---------------------------------------------------------------------------
// DemucsSeparator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    config: SeparationConfig,
}

impl DemucsSeparator {
    pub fn new(config: SeparationConfig) -> Self {
        Self { config }
    }

    pub fn separation_args(&self, audio: &Path, staging: &Path) -> Vec<String> {
        vec![
            "-n".into(),
            self.config.model.clone(),
            "-d".into(),
            self.config.device.clone(),
            "-j".into(),
            self.config.jobs.to_string(),
            "-o".into(),
            staging.to_string_lossy().into_owned(),
            audio.to_string_lossy().into_owned(),
        ]
    }

    /// Fail fast when CUDA is configured but no NVIDIA GPU answers.
    fn probe_device(&self) -> Result<(), SeparateError> {
        if !self.config.device.starts_with("cuda") {
            return Ok(());
        }
        let unavailable = |detail: String| SeparateError::DeviceUnavailable {
            device: self.config.device.clone(),
            detail,
        };
        if !command_exists("nvidia-smi") {
            return Err(unavailable("nvidia-smi not found on PATH".into()));
        }
        let output = run_command("nvidia-smi", &["-L".to_string()], None)
            .map_err(|e| unavailable(e.to_string()))?;
        if !output.stdout.contains("GPU") {
            return Err(unavailable("nvidia-smi lists no GPU".into()));
        }
        Ok(())
    }
}

/// Locate demucs' output folder: `{staging}/{model}/{track}/`, falling back
/// to any folder under `staging` that holds a vocals stem.
fn find_stem_output(staging: &Path, model: &str, track: &str) -> Option<PathBuf> {
    let expected = staging.join(model).join(track);
    if expected.join(VOCALS_STEM).is_file() {
        return Some(expected);
    }
    let mut stack = vec![staging.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if dir.join(VOCALS_STEM).is_file() {
            return Some(dir);
        }
        if let Ok(entries) = fs::read_dir(&dir) {
            stack.extend(entries.flatten().map(|e| e.path()).filter(|p| p.is_dir()));
        }
    }
    None
}

/// Move every `.wav` of `from` into `to`, first removing the `.wav` stems a
/// previous run left in `to`.
pub fn replace_stems(from: &Path, to: &Path) -> Result<usize, SeparateError> {
    fs::create_dir_all(to).map_err(io_err(to))?;
    for entry in fs::read_dir(to).map_err(io_err(to))?.flatten() {
        let path = entry.path();
        if is_wav(&path) {
            fs::remove_file(&path).map_err(io_err(&path))?;
        }
    }

    let mut moved = 0;
    for entry in fs::read_dir(from).map_err(io_err(from))?.flatten() {
        let path = entry.path();
        if !is_wav(&path) {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let target = to.join(name);
        if fs::rename(&path, &target).is_err() {
            // Cross-device staging directory.
            fs::copy(&path, &target).map_err(io_err(&target))?;
        }
        moved += 1;
    }
    Ok(moved)
}

fn is_wav(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

impl Separator for DemucsSeparator {
    fn separate(&self, audio: &Path, stem_dir: &Path) -> Result<(), SeparateError> {
        self.probe_device()?;

        let parent = stem_dir.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(io_err(parent))?;
        let staging = tempfile::Builder::new()
            .prefix(".separate-")
            .tempdir_in(parent)
            .map_err(io_err(parent))?;

        log::info!(
            "separate: {} with {} on {}",
            audio.display(),
            self.config.model,
            self.config.device
        );
        let args = self.separation_args(audio, staging.path());
        run_command(&self.config.program, &args, None).map_err(SeparateError::Separation)?;

        let track = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let produced = find_stem_output(staging.path(), &self.config.model, &track)
            .ok_or_else(|| SeparateError::MissingVocals(staging.path().to_path_buf()))?;

        let moved = replace_stems(&produced, stem_dir)?;
        if !stem_dir.join(VOCALS_STEM).is_file() {
            return Err(SeparateError::MissingVocals(stem_dir.to_path_buf()));
        }
        log::info!("separate: {moved} stem(s) in {}", stem_dir.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn args_follow_configuration() {
        let sep = DemucsSeparator::new(SeparationConfig::default());
        let args = sep.separation_args(Path::new("audio/song1.mp3"), Path::new("/tmp/stage"));
        assert_eq!(
            args,
            vec![
                "-n",
                "htdemucs_6s",
                "-d",
                "cuda",
                "-j",
                "4",
                "-o",
                "/tmp/stage",
                "audio/song1.mp3"
            ]
        );
    }

    #[test]
    fn stem_output_is_found_under_model_dir() {
        let dir = tempdir().expect("temp dir");
        let out = dir.path().join("htdemucs_6s").join("Other_Name");
        fs::create_dir_all(&out).expect("mkdir");
        fs::write(out.join(VOCALS_STEM), b"").expect("write");

        assert_eq!(
            find_stem_output(dir.path(), "htdemucs_6s", "song1"),
            Some(out)
        );
        assert_eq!(find_stem_output(&dir.path().join("missing"), "m", "t"), None);
    }

    #[test]
    fn replace_stems_drops_stale_wavs() {
        let dir = tempdir().expect("temp dir");
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        fs::create_dir_all(&from).expect("mkdir");
        fs::create_dir_all(&to).expect("mkdir");
        fs::write(from.join("vocals.wav"), b"v").expect("write");
        fs::write(from.join("drums.wav"), b"d").expect("write");
        fs::write(to.join("stale.wav"), b"s").expect("write");
        fs::write(to.join("notes.txt"), b"keep").expect("write");

        assert_eq!(replace_stems(&from, &to).expect("replace"), 2);
        assert!(to.join("vocals.wav").is_file());
        assert!(to.join("drums.wav").is_file());
        assert!(!to.join("stale.wav").exists());
        assert!(to.join("notes.txt").exists());
    }

    #[test]
    fn cpu_device_skips_probe() {
        let config = SeparationConfig {
            device: "cpu".into(),
            ..SeparationConfig::default()
        };
        assert!(DemucsSeparator::new(config).probe_device().is_ok());
    }

    #[test]
    fn missing_separator_is_separation_error() {
        let dir = tempdir().expect("temp dir");
        let config = SeparationConfig {
            program: "definitely-not-demucs-4711".into(),
            device: "cpu".into(),
            ..SeparationConfig::default()
        };
        let err = DemucsSeparator::new(config)
            .separate(
                &dir.path().join("song1.mp3"),
                &dir.path().join("audio_separated").join("song1"),
            )
            .unwrap_err();
        assert!(matches!(err, SeparateError::Separation(CommandError::Missing { .. })));
    }
}
