//! Artifact kinds and the on-disk layout that maps a project name to them.
//!
//! Every stage writes exactly one artifact kind.  The project name is the
//! only join key between stages:
//!
//! ```text
//! <root>/audio/{name}.mp3                       SourceAudio
//! <root>/audio_separated/{name}/{stem}.wav      StemSet
//! <root>/subtitle_srt/{name}.srt                SegmentSubtitle
//! <root>/subtitle_ass/{name}.ass                WordSubtitle
//! <root>/karaokes_completos/{name}_karaoke.mp4  FinalVideo
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the distinguished vocals member of a stem set.
pub const VOCALS_STEM: &str = "vocals.wav";

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// The five artifact kinds, one per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    SourceAudio,
    StemSet,
    SegmentSubtitle,
    WordSubtitle,
    FinalVideo,
}

impl ArtifactKind {
    /// All kinds in production order.
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::SourceAudio,
        ArtifactKind::StemSet,
        ArtifactKind::SegmentSubtitle,
        ArtifactKind::WordSubtitle,
        ArtifactKind::FinalVideo,
    ];

    /// Directory (relative to the namespace root) holding this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::SourceAudio => "audio",
            ArtifactKind::StemSet => "audio_separated",
            ArtifactKind::SegmentSubtitle => "subtitle_srt",
            ArtifactKind::WordSubtitle => "subtitle_ass",
            ArtifactKind::FinalVideo => "karaokes_completos",
        }
    }

    /// File extensions accepted by the resolver's pattern search.
    ///
    /// Empty for [`ArtifactKind::StemSet`], which is a directory.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ArtifactKind::SourceAudio => &["mp3", "m4a", "wav", "flac", "ogg", "opus", "webm"],
            ArtifactKind::StemSet => &[],
            ArtifactKind::SegmentSubtitle => &["srt"],
            ArtifactKind::WordSubtitle => &["ass"],
            ArtifactKind::FinalVideo => &["mp4"],
        }
    }

    /// `true` when the artifact is a directory rather than a single file.
    pub fn is_directory(self) -> bool {
        matches!(self, ArtifactKind::StemSet)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArtifactKind::SourceAudio => "SourceAudio",
            ArtifactKind::StemSet => "StemSet",
            ArtifactKind::SegmentSubtitle => "SegmentSubtitle",
            ArtifactKind::WordSubtitle => "WordSubtitle",
            ArtifactKind::FinalVideo => "FinalVideo",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// ArtifactNamespace
// ---------------------------------------------------------------------------

/// Filesystem namespace rooted at an explicit directory.
///
/// Passed by value into every component instead of relying on the process
/// working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNamespace {
    root: PathBuf,
}

impl ArtifactNamespace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every artifact of `kind`.
    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Canonical location of the `(project, kind)` artifact.
    ///
    /// For [`ArtifactKind::StemSet`] this is the stem directory.
    pub fn canonical_path(&self, project: &str, kind: ArtifactKind) -> PathBuf {
        let dir = self.dir(kind);
        match kind {
            ArtifactKind::SourceAudio => dir.join(format!("{project}.mp3")),
            ArtifactKind::StemSet => dir.join(project),
            ArtifactKind::SegmentSubtitle => dir.join(format!("{project}.srt")),
            ArtifactKind::WordSubtitle => dir.join(format!("{project}.ass")),
            ArtifactKind::FinalVideo => dir.join(format!("{project}_karaoke.mp4")),
        }
    }

    /// `audio_separated/{project}/{stem}.wav`
    pub fn stem_path(&self, project: &str, stem: &str) -> PathBuf {
        self.canonical_path(project, ArtifactKind::StemSet)
            .join(format!("{stem}.wav"))
    }

    /// Path of the transient combined-instrumental audio used by Render.
    pub fn instrumental_temp_path(&self, project: &str) -> PathBuf {
        self.dir(ArtifactKind::FinalVideo)
            .join(format!("{project}_instrumental.mp3"))
    }

    /// Create all five artifact directories.  Existing directories are left
    /// untouched.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for kind in ArtifactKind::ALL {
            std::fs::create_dir_all(self.dir(kind))?;
        }
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
    fn canonical_paths_follow_layout() {
        let ns = ArtifactNamespace::new("/work");

        assert_eq!(
            ns.canonical_path("song1", ArtifactKind::SourceAudio),
            PathBuf::from("/work/audio/song1.mp3")
        );
        assert_eq!(
            ns.canonical_path("song1", ArtifactKind::StemSet),
            PathBuf::from("/work/audio_separated/song1")
        );
        assert_eq!(
            ns.canonical_path("song1", ArtifactKind::SegmentSubtitle),
            PathBuf::from("/work/subtitle_srt/song1.srt")
        );
        assert_eq!(
            ns.canonical_path("song1", ArtifactKind::WordSubtitle),
            PathBuf::from("/work/subtitle_ass/song1.ass")
        );
        assert_eq!(
            ns.canonical_path("song1", ArtifactKind::FinalVideo),
            PathBuf::from("/work/karaokes_completos/song1_karaoke.mp4")
        );
    }

    #[test]
    fn stem_and_transient_paths() {
        let ns = ArtifactNamespace::new("/work");
        assert_eq!(
            ns.stem_path("song1", "vocals"),
            PathBuf::from("/work/audio_separated/song1/vocals.wav")
        );
        assert_eq!(
            ns.instrumental_temp_path("song1"),
            PathBuf::from("/work/karaokes_completos/song1_instrumental.mp3")
        );
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let dir = tempdir().expect("temp dir");
        let ns = ArtifactNamespace::new(dir.path());

        ns.ensure_dirs().expect("first create");
        ns.ensure_dirs().expect("second create");

        for kind in ArtifactKind::ALL {
            assert!(ns.dir(kind).is_dir(), "{kind} dir missing");
        }
    }

    #[test]
    fn only_stem_set_is_a_directory() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.is_directory(), kind == ArtifactKind::StemSet);
            assert_eq!(kind.extensions().is_empty(), kind == ArtifactKind::StemSet);
        }
    }
}
