//! Prompt for lyric-guided subtitle correction.
//!
//! The model receives the SubRip transcript and the reference lyrics and must
//! answer with SubRip only.  Entries, timestamps and the line each word sits
//! on must survive unchanged, since the aligner and the karaoke synthesizer
//! rely on the transcript's segmentation.

const SYSTEM_INSTRUCTION: &str = "\
You are a karaoke subtitle assistant. You receive an SRT subtitle produced \
by speech recognition and the original lyrics of the song.
Rules:
1. Fix only the passages that are not literally or grammatically correct \
according to the lyrics. Do not invent text.
2. Keep every entry, its index and its timestamps exactly as they are.
3. Keep each word on the entry it already belongs to. Never move words \
between entries.
4. Keep the language of the lyrics.
5. Reply with the corrected SRT content only, without comments, \
explanations or code fences.";

/// Builds correction prompts as a single string (Gemini) or as a
/// `(system, user)` pair (chat-completions APIs).
///
/// ```rust
/// use karaoke_pipeline::llm::PromptBuilder;
///
/// let prompt = PromptBuilder::new().build("1\n00:00:01,000 --> 00:00:02,000\nola\n", "Olá");
/// assert!(prompt.contains("Lyrics:\nOlá"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn system_instruction(&self) -> &'static str {
        SYSTEM_INSTRUCTION
    }

    /// User message: the lyrics first, then the subtitle to correct.
    pub fn user_message(&self, subtitle: &str, lyrics: &str) -> String {
        format!(
            "Lyrics:\n{}\n\nSRT subtitle:\n{}",
            lyrics.trim(),
            subtitle.trim()
        )
    }

    /// Flat prompt: instruction followed by the user message.
    pub fn build(&self, subtitle: &str, lyrics: &str) -> String {
        format!(
            "{}\n\n{}",
            SYSTEM_INSTRUCTION,
            self.user_message(subtitle, lyrics)
        )
    }

    pub fn build_chat(&self, subtitle: &str, lyrics: &str) -> (String, String) {
        (
            SYSTEM_INSTRUCTION.to_string(),
            self.user_message(subtitle, lyrics),
        )
    }
}

/// Remove a Markdown code fence wrapped around a reply, if any.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```srt) up to the first newline.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}
