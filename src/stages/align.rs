//! Align + Synthesize stage.
//!
//! The segment subtitle goes to a forced aligner, which returns word timings
//! per segment.  Those are fitted back onto the subtitle entries and
//! rendered as karaoke `.ass`.
//!
//! The aligner is an external command speaking JSON files:
//!
//! ```text
//! input  {segments}:  [{"text": "...", "start": 1.0, "end": 3.5}, ...]
//! output {output}:    {"segments": [{"start": 1.0, "end": 3.5, "text": "...",
//!                       "words": [{"word": "...", "start": 1.0, "end": 1.4}, ...]}]}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AlignConfig;
use crate::process::{run_command, CommandError};
use crate::subtitles::{render_ass, AlignedLine, AlignedWord, SegmentSubtitle, SrtEntry, SubtitleError};

// ---------------------------------------------------------------------------
// AlignError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("aligner failed: {0}")]
    Aligner(#[source] CommandError),

    #[error("aligner output {} is not valid: {source}", .path.display())]
    InvalidOutput {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("aligner returned {found} line(s) for {expected} subtitle entries")]
    LineCount { expected: usize, found: usize },

    #[error("cannot read segment subtitle: {0}")]
    Subtitle(#[from] SubtitleError),

    #[error("file operation on {} failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInput {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl From<&SrtEntry> for SegmentInput {
    fn from(entry: &SrtEntry) -> Self {
        Self {
            text: entry.text.clone(),
            start: entry.start,
            end: entry.end,
        }
    }
}

/// A word as reported by the aligner.  Words the aligner could not place
/// (numbers, symbols) come without timing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WordTiming {
    pub word: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlignedSegment {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

#[derive(Debug, Deserialize)]
struct AlignerOutput {
    segments: Vec<AlignedSegment>,
}

// ---------------------------------------------------------------------------
// Aligner trait
// ---------------------------------------------------------------------------

/// Word-level forced alignment of subtitle entries against audio.
pub trait Aligner: Send + Sync {
    fn align(&self, entries: &[SrtEntry], audio: &Path) -> Result<Vec<AlignedSegment>, AlignError>;
}

// ---------------------------------------------------------------------------
// CommandAligner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CommandAligner {
    config: AlignConfig,
}

impl CommandAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    /// Substitute the placeholders of the configured argument template.
    pub fn render_args(&self, audio: &Path, segments: &Path, output: &Path) -> Vec<String> {
        let audio = audio.to_string_lossy();
        let segments = segments.to_string_lossy();
        let output = output.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{audio}", &audio)
                    .replace("{segments}", &segments)
                    .replace("{output}", &output)
                    .replace("{language}", &self.config.language)
                    .replace("{device}", &self.config.device)
            })
            .collect()
    }
}

impl Aligner for CommandAligner {
    fn align(&self, entries: &[SrtEntry], audio: &Path) -> Result<Vec<AlignedSegment>, AlignError> {
        let work = tempfile::tempdir().map_err(|source| AlignError::Io {
            path: std::env::temp_dir(),
            source,
        })?;
        let segments_path = work.path().join("segments.json");
        let output_path = work.path().join("aligned.json");

        let input: Vec<SegmentInput> = entries.iter().map(SegmentInput::from).collect();
        let json = serde_json::to_vec_pretty(&input).map_err(|source| AlignError::InvalidOutput {
            path: segments_path.clone(),
            source,
        })?;
        fs::write(&segments_path, json).map_err(|source| AlignError::Io {
            path: segments_path.clone(),
            source,
        })?;

        log::info!(
            "align: {} segment(s) of {} ({}, {})",
            entries.len(),
            audio.display(),
            self.config.language,
            self.config.device
        );
        let args = self.render_args(audio, &segments_path, &output_path);
        run_command(&self.config.program, &args, None).map_err(AlignError::Aligner)?;

        let raw = fs::read(&output_path).map_err(|source| AlignError::Io {
            path: output_path.clone(),
            source,
        })?;
        let output: AlignerOutput =
            serde_json::from_slice(&raw).map_err(|source| AlignError::InvalidOutput {
                path: output_path.clone(),
                source,
            })?;
        Ok(output.segments)
    }
}

// ---------------------------------------------------------------------------
// Fitting and synthesis
// ---------------------------------------------------------------------------

/// Fit aligner output onto the subtitle entries, one line per entry.
///
/// Line bounds always come from the entry.  A word without a start begins at
/// the previous word's end; a word without an end gets zero highlight.
/// Blank words are dropped.
pub fn fit_lines(
    entries: &[SrtEntry],
    segments: Vec<AlignedSegment>,
) -> Result<Vec<AlignedLine>, AlignError> {
    if segments.len() != entries.len() {
        return Err(AlignError::LineCount {
            expected: entries.len(),
            found: segments.len(),
        });
    }

    let lines = entries
        .iter()
        .zip(segments)
        .map(|(entry, segment)| {
            let mut cursor = entry.start;
            let words = segment
                .words
                .into_iter()
                .filter(|w| !w.word.trim().is_empty())
                .map(|w| {
                    let start = w.start.unwrap_or(cursor);
                    let end = w.end.unwrap_or(start).max(start);
                    cursor = end;
                    AlignedWord {
                        text: w.word.trim().to_string(),
                        start,
                        end,
                    }
                })
                .collect();
            AlignedLine {
                start: entry.start,
                end: entry.end,
                words,
            }
        })
        .collect();
    Ok(lines)
}

/// Read `srt`, align it against `audio` and write the karaoke subtitle to
/// `ass`.  Returns the number of dialogue lines written.
pub fn synthesize_word_subtitle(
    aligner: &dyn Aligner,
    srt: &Path,
    audio: &Path,
    ass: &Path,
) -> Result<usize, AlignError> {
    let content = fs::read_to_string(srt).map_err(|source| AlignError::Io {
        path: srt.to_path_buf(),
        source,
    })?;
    let subtitle = SegmentSubtitle::parse(&content)?;

    let lines = if subtitle.is_empty() {
        log::warn!("align: {} has no entries", srt.display());
        Vec::new()
    } else {
        let segments = aligner.align(subtitle.entries(), audio)?;
        fit_lines(subtitle.entries(), segments)?
    };

    let document = render_ass(&lines);
    fs::write(ass, document).map_err(|source| AlignError::Io {
        path: ass.to_path_buf(),
        source,
    })?;
    Ok(lines.iter().filter(|l| !l.words.is_empty()).count())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(index: usize, start: f64, end: f64, text: &str) -> SrtEntry {
        SrtEntry {
            index,
            start,
            end,
            text: text.into(),
        }
    }

    fn timed(word: &str, start: f64, end: f64) -> WordTiming {
        WordTiming {
            word: word.into(),
            start: Some(start),
            end: Some(end),
        }
    }

    fn segment(words: Vec<WordTiming>) -> AlignedSegment {
        AlignedSegment {
            start: None,
            end: None,
            text: String::new(),
            words,
        }
    }

    struct FixedAligner(Vec<AlignedSegment>);

    impl Aligner for FixedAligner {
        fn align(&self, _: &[SrtEntry], _: &Path) -> Result<Vec<AlignedSegment>, AlignError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn line_bounds_come_from_entries() {
        let entries = [entry(1, 1.0, 3.0, "ola mundo")];
        let lines = fit_lines(
            &entries,
            vec![AlignedSegment {
                start: Some(1.2),
                end: Some(2.5),
                ..segment(vec![timed("ola", 1.2, 1.5), timed("mundo", 1.5, 2.5)])
            }],
        )
        .expect("fit");

        assert_eq!(lines[0].start, 1.0);
        assert_eq!(lines[0].end, 3.0);
        assert_eq!(lines[0].words.len(), 2);
    }

    #[test]
    fn untimed_words_inherit_previous_end() {
        let entries = [entry(1, 5.0, 8.0, "tenho 20 anos")];
        let words = vec![
            timed("tenho", 5.0, 5.5),
            WordTiming {
                word: "20".into(),
                start: None,
                end: None,
            },
            timed("anos", 6.0, 6.5),
        ];
        let lines = fit_lines(&entries, vec![segment(words)]).expect("fit");
        let w = &lines[0].words[1];

        assert_eq!((w.start, w.end), (5.5, 5.5));
    }

    #[test]
    fn first_untimed_word_starts_at_line_start() {
        let entries = [entry(1, 2.0, 4.0, "x")];
        let words = vec![WordTiming {
            word: "x".into(),
            start: None,
            end: Some(2.5),
        }];
        let lines = fit_lines(&entries, vec![segment(words)]).expect("fit");
        assert_eq!(lines[0].words[0].start, 2.0);
    }

    #[test]
    fn line_count_mismatch_is_alignment_error() {
        let entries = [entry(1, 0.0, 1.0, "a"), entry(2, 1.0, 2.0, "b")];
        let err = fit_lines(&entries, vec![segment(vec![])]).unwrap_err();
        assert!(matches!(
            err,
            AlignError::LineCount {
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn aligner_output_parses_with_missing_timings() {
        let json = r#"{"segments":[{"start":1.0,"end":2.0,"text":"ola 3",
            "words":[{"word":"ola","start":1.0,"end":1.5,"score":0.9},{"word":"3"}]}]}"#;
        let out: AlignerOutput = serde_json::from_str(json).expect("parse");
        assert_eq!(out.segments[0].words[1].start, None);
        assert_eq!(out.segments[0].words[0].end, Some(1.5));
    }

    #[test]
    fn args_template_is_substituted() {
        let aligner = CommandAligner::new(AlignConfig::default());
        let args = aligner.render_args(
            Path::new("/a/vocals.wav"),
            Path::new("/t/segments.json"),
            Path::new("/t/aligned.json"),
        );
        assert_eq!(
            args.join(" "),
            "--audio /a/vocals.wav --segments /t/segments.json --output /t/aligned.json \
             --language pt --device cpu"
        );
    }

    #[test]
    fn synthesize_writes_karaoke_file() {
        let dir = tempdir().expect("temp dir");
        let srt = dir.path().join("song1.srt");
        let ass = dir.path().join("song1.ass");
        fs::write(
            &srt,
            "1\n00:00:01,000 --> 00:00:02,000\nola\n\n2\n00:00:03,000 --> 00:00:04,000\n???\n",
        )
        .expect("write");

        let aligner = FixedAligner(vec![
            segment(vec![timed("ola", 1.0, 1.5)]),
            segment(vec![]),
        ]);
        let written =
            synthesize_word_subtitle(&aligner, &srt, Path::new("vocals.wav"), &ass).expect("ok");

        assert_eq!(written, 1);
        let doc = fs::read_to_string(&ass).expect("read");
        assert!(doc.contains("Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,{\\k50}ola"));
        assert_eq!(doc.matches("Dialogue:").count(), 1);
    }

    #[test]
    fn missing_aligner_program_is_aligner_error() {
        let config = AlignConfig {
            program: "definitely-not-an-aligner-4711".into(),
            ..AlignConfig::default()
        };
        let err = CommandAligner::new(config)
            .align(&[entry(1, 0.0, 1.0, "a")], Path::new("vocals.wav"))
            .unwrap_err();
        assert!(matches!(err, AlignError::Aligner(CommandError::Missing { .. })));
    }
}
