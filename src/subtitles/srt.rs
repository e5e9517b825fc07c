//! SubRip (`.srt`) segment subtitles.
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! First line
//!
//! 2
//! 00:00:05,000 --> 00:00:08,000
//! Second line
//! ```
//!
//! Times are held as seconds (`f64`) so they flow unchanged into the aligner
//! and the karaoke synthesizer.

use super::SubtitleError;
use crate::stt::Segment;

// ---------------------------------------------------------------------------
// SrtEntry
// ---------------------------------------------------------------------------

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtEntry {
    /// 1-based position in the file.
    pub index: usize,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
}

// ---------------------------------------------------------------------------
// SegmentSubtitle
// ---------------------------------------------------------------------------

/// Ordered, non-overlapping sequence of [`SrtEntry`] values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentSubtitle {
    entries: Vec<SrtEntry>,
}

impl SegmentSubtitle {
    /// Build from transcription segments, enforcing the ordering invariants:
    ///
    /// * text is trimmed and empty segments are dropped,
    /// * a start earlier than the previous end is moved up to that end,
    /// * segments left with `start >= end` are dropped,
    /// * indices are renumbered from 1.
    pub fn from_segments(segments: &[Segment]) -> Self {
        let mut entries: Vec<SrtEntry> = Vec::with_capacity(segments.len());
        let mut last_end = 0.0_f64;

        for segment in segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }
            let start = segment.start.max(last_end).max(0.0);
            let end = segment.end;
            if start >= end {
                log::debug!(
                    "srt: dropping segment {:.3}-{:.3} ({text:?}) with no remaining span",
                    segment.start,
                    segment.end
                );
                continue;
            }
            entries.push(SrtEntry {
                index: entries.len() + 1,
                start,
                end,
                text: text.to_string(),
            });
            last_end = end;
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[SrtEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialise to SubRip text.  Output is byte-stable for equal input.
    pub fn compose(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                entry.index,
                format_srt_time(entry.start),
                format_srt_time(entry.end),
                entry.text
            ));
        }
        out
    }

    /// Parse SubRip text.
    ///
    /// Blocks are separated by blank lines; the index line is optional.
    /// Entries are renumbered in file order.
    pub fn parse(content: &str) -> Result<Self, SubtitleError> {
        let content = content
            .trim_start_matches('\u{feff}')
            .replace("\r\n", "\n")
            .replace('\r', "\n");

        let mut entries = Vec::new();
        let mut line_no = 0usize;

        for block in content.split("\n\n") {
            let raw: Vec<&str> = block.lines().map(str::trim_end).collect();
            let blank_prefix = raw.iter().take_while(|l| l.trim().is_empty()).count();
            let block_start = line_no + 1 + blank_prefix;
            line_no += raw.len() + 1;

            let lines = &raw[blank_prefix..];
            if lines.is_empty() {
                continue;
            }

            let Some(timing_idx) = lines.iter().position(|l| l.contains("-->")) else {
                return Err(SubtitleError::Parse {
                    line: block_start,
                    message: format!("missing timing line in block {:?}", lines[0]),
                });
            };

            let (start, end) = parse_timing_line(lines[timing_idx]).ok_or_else(|| {
                SubtitleError::Parse {
                    line: block_start + timing_idx,
                    message: format!("invalid timing {:?}", lines[timing_idx]),
                }
            })?;

            let text = lines[timing_idx + 1..].join("\n");
            entries.push(SrtEntry {
                index: entries.len() + 1,
                start,
                end,
                text: text.trim().to_string(),
            });
        }

        Ok(Self { entries })
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Format seconds as `HH:MM:SS,mmm` (millisecond precision, rounded).
pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is accepted too) into seconds.
pub fn parse_srt_time(value: &str) -> Option<f64> {
    let value = value.trim();
    let (hms, frac) = value
        .split_once(',')
        .or_else(|| value.split_once('.'))
        .unwrap_or((value, "0"));

    let mut parts = hms.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let mins: u64 = parts.next()?.trim().parse().ok()?;
    let secs: u64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || mins >= 60 || secs >= 60 {
        return None;
    }

    let frac = frac.trim();
    if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    // Normalise to milliseconds regardless of the number of digits.
    let millis: u64 = format!("{frac:0<3}")[..3].parse().ok()?;

    Some((hours * 3600 + mins * 60 + secs) as f64 + millis as f64 / 1000.0)
}

fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    // Position hints such as `X1:…` may follow the end time.
    let end = rest.split_whitespace().next()?;
    Some((parse_srt_time(start)?, parse_srt_time(end)?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
