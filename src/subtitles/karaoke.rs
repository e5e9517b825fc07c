//! Karaoke subtitle synthesis (Advanced SubStation Alpha, `.ass`).
//!
//! Every aligned line becomes one `Dialogue:` event whose words carry a
//! `{\kNN}` override tag.  `NN` is the word's highlight duration in
//! centiseconds; the renderer fills the word progressively over that time.
//!
//! ```text
//! Dialogue: 0,0:00:01.00,0:00:03.50,Default,,0,0,0,,{\k40}Hello {\k85}world
//! ```

use std::fmt::Write as _;

/// Fixed script header.  A compatibility constant: the style line and the
/// event format line are consumed verbatim by libass.
pub const ASS_HEADER: &str = "[Script Info]
Title: Legenda de Karaokê
ScriptType: v4.00+
WrapStyle: 0
PlayResX: 1280
PlayResY: 720

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
Style: Default,Arial,48,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,1,2,10,10,10,1

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
";

// ---------------------------------------------------------------------------
// Aligned input
// ---------------------------------------------------------------------------

/// A word with its own timing, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// A subtitle line with word-level timing, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedLine {
    pub start: f64,
    pub end: f64,
    pub words: Vec<AlignedWord>,
}

// ---------------------------------------------------------------------------
// Timing helpers
// ---------------------------------------------------------------------------

/// Format seconds as `H:MM:SS.cc`.
///
/// Hours are unpadded, minutes and seconds are two digits, and the
/// centiseconds are truncated, not rounded.  Negative input clamps to zero.
///
/// ```
/// use karaoke_pipeline::subtitles::format_ass_time;
///
/// assert_eq!(format_ass_time(0.0), "0:00:00.00");
/// assert_eq!(format_ass_time(3661.239), "1:01:01.23");
/// ```
pub fn format_ass_time(seconds: f64) -> String {
    let ms = millis(seconds);
    let total = ms / 1000;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    let cs = (ms % 1000) / 10;
    format!("{h}:{m:02}:{s:02}.{cs:02}")
}

/// Highlight duration of a word in centiseconds, truncated toward zero.
/// Reversed spans yield zero.
pub fn highlight_centiseconds(start: f64, end: f64) -> u32 {
    let span = millis(end).saturating_sub(millis(start));
    u32::try_from(span / 10).unwrap_or(u32::MAX)
}

/// Whole milliseconds, so SubRip millisecond timestamps survive the float
/// round trip before truncation to centiseconds.
fn millis(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Build the `{\kNN}word {\kNN}word` text of a line.
///
/// Returns `None` for lines with no words; those lines are skipped rather
/// than emitted without highlight.
pub fn karaoke_text(line: &AlignedLine) -> Option<String> {
    if line.words.is_empty() {
        return None;
    }
    let tagged: Vec<String> = line
        .words
        .iter()
        .map(|w| {
            format!(
                "{{\\k{}}}{}",
                highlight_centiseconds(w.start, w.end),
                w.text.trim()
            )
        })
        .collect();
    Some(tagged.join(" ").trim().to_string())
}

/// Render a complete `.ass` document.
///
/// Dialogue events keep the input line order, since the renderer composites
/// them without re-sorting.
pub fn render_ass(lines: &[AlignedLine]) -> String {
    let mut out = String::with_capacity(ASS_HEADER.len() + lines.len() * 96);
    out.push_str(ASS_HEADER);

    let mut skipped = 0usize;
    for line in lines {
        let Some(text) = karaoke_text(line) else {
            skipped += 1;
            continue;
        };
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "Dialogue: 0,{},{},Default,,0,0,0,,{}",
            format_ass_time(line.start),
            format_ass_time(line.end),
            text
        );
    }

    if skipped > 0 {
        log::info!("karaoke: skipped {skipped} line(s) without aligned words");
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> AlignedWord {
        AlignedWord {
            text: text.into(),
            start,
            end,
        }
    }

    fn dialogue_lines(doc: &str) -> Vec<&str> {
        doc.lines().filter(|l| l.starts_with("Dialogue:")).collect()
    }

    #[test]
    fn time_format_examples() {
        assert_eq!(format_ass_time(0.0), "0:00:00.00");
        assert_eq!(format_ass_time(3661.239), "1:01:01.23");
        assert_eq!(format_ass_time(59.999), "0:00:59.99");
        assert_eq!(format_ass_time(36_000.5), "10:00:00.50");
        assert_eq!(format_ass_time(-1.0), "0:00:00.00");
    }

    #[test]
    fn highlight_truncates_and_never_goes_negative() {
        assert_eq!(highlight_centiseconds(1.0, 1.509), 50);
        assert_eq!(highlight_centiseconds(2.0, 2.0), 0);
        assert_eq!(highlight_centiseconds(3.0, 2.0), 0);
    }

    #[test]
    fn srt_millisecond_times_keep_their_centiseconds() {
        assert_eq!(format_ass_time(1.13), "0:00:01.13");
        assert_eq!(highlight_centiseconds(0.0, 0.29), 29);

        for ms in 0..60_000u64 {
            let srt = crate::subtitles::format_srt_time(ms as f64 / 1000.0);
            let secs = crate::subtitles::parse_srt_time(&srt).expect("srt time");
            let expected = format!("0:{:02}:{:02}.{:02}", ms / 60_000, (ms / 1000) % 60, (ms % 1000) / 10);
            assert_eq!(format_ass_time(secs), expected, "{srt}");
        }
    }

    #[test]
    fn line_without_words_is_skipped() {
        let lines = vec![
            AlignedLine {
                start: 0.0,
                end: 1.0,
                words: vec![],
            },
            AlignedLine {
                start: 1.0,
                end: 2.0,
                words: vec![word("ola", 1.0, 1.5)],
            },
        ];
        let doc = render_ass(&lines);
        let dialogue = dialogue_lines(&doc);

        assert_eq!(dialogue.len(), 1);
        assert_eq!(
            dialogue[0],
            "Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,{\\k50}ola"
        );
    }

    #[test]
    fn n_words_produce_n_tags_in_order() {
        let line = AlignedLine {
            start: 10.0,
            end: 13.0,
            words: vec![
                word("canta", 10.0, 10.5),
                word(" comigo ", 10.5, 11.5),
                word("agora", 11.75, 12.5),
            ],
        };
        let text = karaoke_text(&line).expect("has words");

        assert_eq!(text, "{\\k50}canta {\\k100}comigo {\\k75}agora");
        assert_eq!(text.matches("{\\k").count(), 3);
    }

    #[test]
    fn trailing_gap_is_not_an_error() {
        // Highlights sum to 30 cs while the line lasts 500 cs.
        let line = AlignedLine {
            start: 0.0,
            end: 5.0,
            words: vec![word("a", 0.0, 0.1), word("b", 0.1, 0.3)],
        };
        let doc = render_ass(&[line]);
        assert!(doc.contains("0:00:00.00,0:00:05.00"));
    }

    #[test]
    fn document_starts_with_fixed_header_and_keeps_order() {
        let lines: Vec<AlignedLine> = (0..3)
            .map(|i| AlignedLine {
                start: i as f64,
                end: i as f64 + 0.5,
                words: vec![word(&format!("w{i}"), i as f64, i as f64 + 0.25)],
            })
            .collect();
        let doc = render_ass(&lines);

        assert!(doc.starts_with(ASS_HEADER));
        let dialogue = dialogue_lines(&doc);
        assert_eq!(dialogue.len(), 3);
        for (i, d) in dialogue.iter().enumerate() {
            assert!(d.ends_with(&format!("{{\\k25}}w{i}")), "out of order: {d}");
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let lines = vec![AlignedLine {
            start: 1.0,
            end: 2.0,
            words: vec![word("x", 1.0, 1.2)],
        }];
        assert_eq!(render_ass(&lines), render_ass(&lines));
    }
}
