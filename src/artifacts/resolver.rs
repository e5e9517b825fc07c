//! Locates existing artifacts for a project, tolerating naming drift.
//!
//! Lookup order for `resolve(Some(project), kind)`:
//!
//! 1. The exact canonical path from [`ArtifactNamespace::canonical_path`].
//! 2. Any entry in the kind's directory whose name starts with `project`
//!    and has the kind's shape; the most recently modified one wins.
//!
//! `resolve(None, SourceAudio)` returns the most recently modified source
//! audio across all projects, which is how a run discovers its project name
//! when none was given.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

use super::namespace::{ArtifactKind, ArtifactNamespace, VOCALS_STEM};

// ---------------------------------------------------------------------------
// ArtifactError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No candidate exists for the requested project and kind.
    #[error("{kind} artifact not found for project '{project}'")]
    NotFound { kind: ArtifactKind, project: String },

    /// No candidate exists for the kind in any project.
    #[error("no {kind} artifact found in {dir}")]
    NoneAvailable { kind: ArtifactKind, dir: PathBuf },

    /// Only source audio can be resolved without a project name.
    #[error("a project name is required to resolve {kind}")]
    NameRequired { kind: ArtifactKind },

    #[error("failed to scan {dir}: {source}")]
    Scan {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// ArtifactResolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    namespace: ArtifactNamespace,
}

impl ArtifactResolver {
    pub fn new(namespace: ArtifactNamespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &ArtifactNamespace {
        &self.namespace
    }

    /// Resolve the artifact of `kind` for `project`.
    ///
    /// # Errors
    ///
    /// - [`ArtifactError::NotFound`] when neither the canonical path nor a
    ///   pattern match exists.
    /// - [`ArtifactError::NoneAvailable`] when `project` is `None` and no
    ///   source audio exists at all.
    /// - [`ArtifactError::NameRequired`] when `project` is `None` and `kind`
    ///   is not [`ArtifactKind::SourceAudio`].
    pub fn resolve(
        &self,
        project: Option<&str>,
        kind: ArtifactKind,
    ) -> Result<PathBuf, ArtifactError> {
        match project {
            Some(name) => self.resolve_named(name, kind),
            None if kind == ArtifactKind::SourceAudio => self.resolve_latest(kind),
            None => Err(ArtifactError::NameRequired { kind }),
        }
    }

    fn resolve_named(&self, project: &str, kind: ArtifactKind) -> Result<PathBuf, ArtifactError> {
        let exact = self.namespace.canonical_path(project, kind);
        if has_shape(&exact, kind) {
            return Ok(exact);
        }
        log::debug!("resolver: no exact {kind} at {}", exact.display());

        let candidates = self.candidates(kind, |name| name.starts_with(project))?;
        match newest(candidates) {
            Some(path) => {
                log::info!(
                    "resolver: using {kind} '{}' for project '{project}'",
                    path.display()
                );
                Ok(path)
            }
            None => Err(ArtifactError::NotFound {
                kind,
                project: project.to_string(),
            }),
        }
    }

    fn resolve_latest(&self, kind: ArtifactKind) -> Result<PathBuf, ArtifactError> {
        let candidates = self.candidates(kind, |_| true)?;
        newest(candidates).ok_or_else(|| ArtifactError::NoneAvailable {
            kind,
            dir: self.namespace.dir(kind),
        })
    }

    /// Entries of the kind's directory that have the kind's shape and whose
    /// file name satisfies `accept`.  A missing directory yields no entries.
    fn candidates(
        &self,
        kind: ArtifactKind,
        accept: impl Fn(&str) -> bool,
    ) -> Result<Vec<(PathBuf, SystemTime)>, ArtifactError> {
        let dir = self.namespace.dir(kind);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(ArtifactError::Scan { dir, source }),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ArtifactError::Scan {
                dir: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !accept(name) || !has_shape(&path, kind) {
                continue;
            }
            found.push((path.clone(), modified_time(&path, kind)));
        }
        Ok(found)
    }
}

/// Whether `path` exists with the shape expected for `kind`.
fn has_shape(path: &Path, kind: ArtifactKind) -> bool {
    if kind.is_directory() {
        return path.is_dir() && path.join(VOCALS_STEM).is_file();
    }
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                kind.extensions()
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
}

/// Modification time used for ordering.  Stem sets use their vocals member,
/// which is rewritten on every separation.
fn modified_time(path: &Path, kind: ArtifactKind) -> SystemTime {
    let probe = if kind.is_directory() {
        path.join(VOCALS_STEM)
    } else {
        path.to_path_buf()
    };
    std::fs::metadata(probe)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Newest entry; equal timestamps fall back to the smallest path.
fn newest(candidates: Vec<(PathBuf, SystemTime)>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .max_by(|(pa, ta), (pb, tb)| ta.cmp(tb).then_with(|| pb.cmp(pa)))
        .map(|(path, _)| path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, ArtifactResolver) {
        let dir = tempdir().expect("temp dir");
        let ns = ArtifactNamespace::new(dir.path());
        ns.ensure_dirs().expect("dirs");
        (dir, ArtifactResolver::new(ns))
    }

    /// Write `path` and pin its mtime to `secs` after the epoch.
    fn touch(path: &Path, secs: u64) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("parent");
        }
        std::fs::write(path, b"x").expect("write");
        let file = std::fs::File::options()
            .write(true)
            .open(path)
            .expect("open");
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .expect("set mtime");
    }

    #[test]
    fn exact_match_wins_over_pattern() {
        let (dir, resolver) = setup();
        let root = dir.path();
        touch(&root.join("subtitle_srt/song1.srt"), 100);
        touch(&root.join("subtitle_srt/song1_fixed.srt"), 200);

        let got = resolver
            .resolve(Some("song1"), ArtifactKind::SegmentSubtitle)
            .expect("resolve");
        assert_eq!(got, root.join("subtitle_srt/song1.srt"));
    }

    #[test]
    fn single_pattern_match_is_returned() {
        let (dir, resolver) = setup();
        let root = dir.path();
        touch(&root.join("subtitle_ass/song1_legenda.ass"), 100);

        let got = resolver
            .resolve(Some("song1"), ArtifactKind::WordSubtitle)
            .expect("resolve");
        assert_eq!(got, root.join("subtitle_ass/song1_legenda.ass"));
    }

    #[test]
    fn newest_pattern_match_wins() {
        let (dir, resolver) = setup();
        let root = dir.path();
        touch(&root.join("subtitle_srt/song1_a.srt"), 300);
        touch(&root.join("subtitle_srt/song1_b.srt"), 100);
        touch(&root.join("subtitle_srt/song1_c.srt"), 200);

        let got = resolver
            .resolve(Some("song1"), ArtifactKind::SegmentSubtitle)
            .expect("resolve");
        assert_eq!(got, root.join("subtitle_srt/song1_a.srt"));
    }

    #[test]
    fn equal_mtimes_break_ties_by_name() {
        let (dir, resolver) = setup();
        let root = dir.path();
        touch(&root.join("subtitle_srt/song1_b.srt"), 100);
        touch(&root.join("subtitle_srt/song1_a.srt"), 100);

        let got = resolver
            .resolve(Some("song1"), ArtifactKind::SegmentSubtitle)
            .expect("resolve");
        assert_eq!(got, root.join("subtitle_srt/song1_a.srt"));
    }

    #[test]
    fn zero_matches_is_not_found() {
        let (dir, resolver) = setup();
        touch(&dir.path().join("subtitle_srt/other.srt"), 100);

        let err = resolver
            .resolve(Some("song1"), ArtifactKind::SegmentSubtitle)
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::NotFound { kind: ArtifactKind::SegmentSubtitle, ref project }
                if project == "song1"
        ));
    }

    #[test]
    fn wrong_extension_is_ignored() {
        let (dir, resolver) = setup();
        touch(&dir.path().join("subtitle_srt/song1.txt"), 100);

        assert!(resolver
            .resolve(Some("song1"), ArtifactKind::SegmentSubtitle)
            .is_err());
    }

    #[test]
    fn source_audio_fallback_accepts_other_audio_extensions() {
        let (dir, resolver) = setup();
        touch(&dir.path().join("audio/song1.m4a"), 100);

        let got = resolver
            .resolve(Some("song1"), ArtifactKind::SourceAudio)
            .expect("resolve");
        assert_eq!(got, dir.path().join("audio/song1.m4a"));
    }

    #[test]
    fn stem_set_requires_vocals_member() {
        let (dir, resolver) = setup();
        let root = dir.path();
        touch(&root.join("audio_separated/song1/drums.wav"), 100);

        let err = resolver
            .resolve(Some("song1"), ArtifactKind::StemSet)
            .unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::NotFound { kind: ArtifactKind::StemSet, .. }
        ));

        touch(&root.join("audio_separated/song1/vocals.wav"), 100);
        let got = resolver
            .resolve(Some("song1"), ArtifactKind::StemSet)
            .expect("resolve");
        assert_eq!(got, root.join("audio_separated/song1"));
    }

    #[test]
    fn unnamed_source_audio_picks_most_recent_project() {
        let (dir, resolver) = setup();
        let root = dir.path();
        touch(&root.join("audio/old_song.mp3"), 100);
        touch(&root.join("audio/new_song.mp3"), 500);
        touch(&root.join("audio/mid_song.mp3"), 300);

        let got = resolver
            .resolve(None, ArtifactKind::SourceAudio)
            .expect("resolve");
        assert_eq!(got, root.join("audio/new_song.mp3"));
    }

    #[test]
    fn unnamed_source_audio_with_empty_dir_fails() {
        let (_dir, resolver) = setup();
        let err = resolver.resolve(None, ArtifactKind::SourceAudio).unwrap_err();
        assert!(matches!(err, ArtifactError::NoneAvailable { .. }));
    }

    #[test]
    fn unnamed_non_audio_kind_requires_name() {
        let (_dir, resolver) = setup();
        let err = resolver.resolve(None, ArtifactKind::WordSubtitle).unwrap_err();
        assert!(matches!(err, ArtifactError::NameRequired { .. }));
    }

    #[test]
    fn missing_directory_is_not_found_rather_than_io_error() {
        let dir = tempdir().expect("temp dir");
        let resolver = ArtifactResolver::new(ArtifactNamespace::new(dir.path()));

        let err = resolver
            .resolve(Some("song1"), ArtifactKind::SegmentSubtitle)
            .unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound { .. }));
    }
}
