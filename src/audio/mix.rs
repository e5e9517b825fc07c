//! Instrumental combiner.
//!
//! Overlays every non-vocal stem of a stem set into one buffer, the backing
//! track of the final karaoke video.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::wav::{read_wav, AudioBuffer};
use crate::artifacts::VOCALS_STEM;

// ---------------------------------------------------------------------------
// MixError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MixError {
    /// The stem set holds nothing besides the vocals.
    #[error("no instrumental stems in {}", .0.display())]
    NoInstrumentalStems(PathBuf),

    #[error(
        "stem {} is {found_channels} ch @ {found_rate} Hz, expected {expected_channels} ch @ {expected_rate} Hz",
        .path.display()
    )]
    FormatMismatch {
        path: PathBuf,
        expected_channels: u16,
        expected_rate: u32,
        found_channels: u16,
        found_rate: u32,
    },

    #[error("cannot decode {}: {source}", .path.display())]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("cannot list stems in {}: {source}", .dir.display())]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// InstrumentalCombiner
// ---------------------------------------------------------------------------

/// Sums the instrumental stems of a stem directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentalCombiner;

impl InstrumentalCombiner {
    pub fn new() -> Self {
        Self
    }

    /// Instrumental stem files in `stem_dir`: every `.wav` except
    /// [`VOCALS_STEM`], sorted by file name.
    pub fn instrumental_stems(&self, stem_dir: &Path) -> Result<Vec<PathBuf>, MixError> {
        let io_err = |source| MixError::Io {
            dir: stem_dir.to_path_buf(),
            source,
        };

        let mut stems = Vec::new();
        for entry in fs::read_dir(stem_dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() {
                continue;
            }
            let is_wav = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            let is_vocals = path.file_name().and_then(|n| n.to_str()) == Some(VOCALS_STEM);
            if is_wav && !is_vocals {
                stems.push(path);
            }
        }
        stems.sort();
        Ok(stems)
    }

    /// Mix every instrumental stem of `stem_dir` into one buffer.
    ///
    /// Samples are summed and clamped to `[-1.0, 1.0]`.  Stems of unequal
    /// length are padded with silence to the longest one.
    ///
    /// # Errors
    ///
    /// * [`MixError::NoInstrumentalStems`] when only vocals (or nothing) exist.
    /// * [`MixError::FormatMismatch`] when stems disagree on channels or rate.
    pub fn combine(&self, stem_dir: &Path) -> Result<AudioBuffer, MixError> {
        let stems = self.instrumental_stems(stem_dir)?;
        if stems.is_empty() {
            return Err(MixError::NoInstrumentalStems(stem_dir.to_path_buf()));
        }

        let mut mixed: Option<AudioBuffer> = None;
        for path in &stems {
            let stem = read_wav(path)?;
            log::debug!(
                "mix: overlaying {} ({:.1} s)",
                path.display(),
                stem.duration_secs()
            );

            let Some(acc) = mixed.as_mut() else {
                mixed = Some(stem);
                continue;
            };
            if stem.channels != acc.channels || stem.sample_rate != acc.sample_rate {
                return Err(MixError::FormatMismatch {
                    path: path.clone(),
                    expected_channels: acc.channels,
                    expected_rate: acc.sample_rate,
                    found_channels: stem.channels,
                    found_rate: stem.sample_rate,
                });
            }
            if stem.samples.len() > acc.samples.len() {
                acc.samples.resize(stem.samples.len(), 0.0);
            }
            for (a, s) in acc.samples.iter_mut().zip(&stem.samples) {
                *a += s;
            }
        }

        let mut mixed = mixed.ok_or_else(|| MixError::NoInstrumentalStems(stem_dir.to_path_buf()))?;
        for s in &mut mixed.samples {
            *s = s.clamp(-1.0, 1.0);
        }
        log::info!(
            "mix: combined {} instrumental stem(s) from {}",
            stems.len(),
            stem_dir.display()
        );
        Ok(mixed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav::write_wav;
    use tempfile::tempdir;

    fn stem(dir: &Path, name: &str, samples: Vec<f32>, channels: u16, rate: u32) {
        write_wav(
            &dir.join(name),
            &AudioBuffer {
                samples,
                channels,
                sample_rate: rate,
            },
        )
        .expect("write stem");
    }

    #[test]
    fn combine_excludes_vocals() {
        let dir = tempdir().expect("temp dir");
        stem(dir.path(), "vocals.wav", vec![0.5, 0.5], 1, 100);
        stem(dir.path(), "drums.wav", vec![0.25, 0.0], 1, 100);
        stem(dir.path(), "bass.wav", vec![0.125, 0.25], 1, 100);

        let combiner = InstrumentalCombiner::new();
        let names: Vec<String> = combiner
            .instrumental_stems(dir.path())
            .expect("list")
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["bass.wav", "drums.wav"]);

        let mixed = combiner.combine(dir.path()).expect("combine");
        assert_eq!(mixed.samples, vec![0.375, 0.25]);
    }

    #[test]
    fn vocals_only_is_no_instrumental_stems() {
        let dir = tempdir().expect("temp dir");
        stem(dir.path(), "vocals.wav", vec![0.5], 1, 100);

        let err = InstrumentalCombiner::new().combine(dir.path()).unwrap_err();
        assert!(matches!(err, MixError::NoInstrumentalStems(_)));
    }

    #[test]
    fn overlay_pads_to_longest_and_clamps() {
        let dir = tempdir().expect("temp dir");
        stem(dir.path(), "drums.wav", vec![0.75, 0.75, 0.5], 1, 100);
        stem(dir.path(), "piano.wav", vec![0.75], 1, 100);

        let mixed = InstrumentalCombiner::new().combine(dir.path()).expect("combine");
        assert_eq!(mixed.samples, vec![1.0, 0.75, 0.5]);
    }

    #[test]
    fn mismatched_rate_is_rejected() {
        let dir = tempdir().expect("temp dir");
        stem(dir.path(), "bass.wav", vec![0.1], 1, 100);
        stem(dir.path(), "drums.wav", vec![0.1], 1, 200);

        let err = InstrumentalCombiner::new().combine(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            MixError::FormatMismatch {
                found_rate: 200,
                ..
            }
        ));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let err = InstrumentalCombiner::new()
            .combine(Path::new("/nonexistent/stems"))
            .unwrap_err();
        assert!(matches!(err, MixError::Io { .. }));
    }
}
