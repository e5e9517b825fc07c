//! Fallback corrector: wraps any [`SubtitleCorrector`] and keeps the
//! uncorrected subtitle whenever correction fails.
//!
//! A reply only counts as a correction when it parses as SubRip with the
//! same entries as the input: same count, same timestamps, no blank text.
//! Anything else (transport errors, blocked generations, chatty replies,
//! merged, split or retimed entries) falls back.

use async_trait::async_trait;

use crate::llm::corrector::{LlmError, SubtitleCorrector};
use crate::subtitles::{format_srt_time, SegmentSubtitle, SrtEntry};

pub struct FallbackCorrector<C: SubtitleCorrector> {
    inner: C,
}

impl<C: SubtitleCorrector> FallbackCorrector<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Correct `subtitle`, or return it unchanged with a warning.
    pub async fn correct_or_keep(&self, subtitle: &str, lyrics: &str) -> String {
        let result = match self.inner.correct(subtitle, lyrics).await {
            Ok(reply) => validate_reply(subtitle, &reply),
            Err(err) => Err(err),
        };
        match result {
            Ok(corrected) => {
                log::info!("llm: subtitle corrected against lyrics");
                corrected
            }
            Err(err) => {
                log::warn!("subtitle correction failed, keeping uncorrected subtitle: {err}");
                subtitle.to_string()
            }
        }
    }
}

/// Accept `reply` only if its entries keep the timestamps of `original`
/// one for one and none lost its text.  The accepted reply is re-composed
/// so the written file is canonical SubRip.
pub fn validate_reply(original: &str, reply: &str) -> Result<String, LlmError> {
    let corrected =
        SegmentSubtitle::parse(reply).map_err(|e| LlmError::InvalidReply(e.to_string()))?;
    let original = SegmentSubtitle::parse(original)
        .map_err(|e| LlmError::InvalidReply(format!("input subtitle: {e}")))?;

    if corrected.len() != original.len() {
        return Err(LlmError::InvalidReply(format!(
            "{} entries, expected {}",
            corrected.len(),
            original.len()
        )));
    }
    for (n, (got, want)) in corrected.entries().iter().zip(original.entries()).enumerate() {
        let span = |e: &SrtEntry| (format_srt_time(e.start), format_srt_time(e.end));
        if span(got) != span(want) {
            return Err(LlmError::InvalidReply(format!(
                "entry {} retimed to {} --> {}",
                n + 1,
                span(got).0,
                span(got).1
            )));
        }
        if got.text.trim().is_empty() {
            return Err(LlmError::InvalidReply(format!("entry {} has no text", n + 1)));
        }
    }
    Ok(corrected.compose())
}

#[async_trait]
impl<C: SubtitleCorrector> SubtitleCorrector for FallbackCorrector<C> {
    /// Never returns `Err(_)`.
    async fn correct(&self, subtitle: &str, lyrics: &str) -> Result<String, LlmError> {
        Ok(self.correct_or_keep(subtitle, lyrics).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const ORIGINAL: &str = "1\n00:00:01,000 --> 00:00:02,000\nola mundu\n\n\
                            2\n00:00:03,000 --> 00:00:04,000\ncanta comigo\n\n";

    struct Fixed(String);

    #[async_trait]
    impl SubtitleCorrector for Fixed {
        async fn correct(&self, _subtitle: &str, _lyrics: &str) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    struct Fails;

    #[async_trait]
    impl SubtitleCorrector for Fails {
        async fn correct(&self, _subtitle: &str, _lyrics: &str) -> Result<String, LlmError> {
            Err(LlmError::Timeout)
        }
    }

    #[tokio::test]
    async fn accepts_reply_with_same_entry_count() {
        let reply = ORIGINAL.replace("mundu", "mundo");
        let corrector = FallbackCorrector::new(Fixed(reply.clone()));
        assert_eq!(corrector.correct_or_keep(ORIGINAL, "ola mundo").await, reply);
    }

    #[tokio::test]
    async fn keeps_original_on_error() {
        let corrector = FallbackCorrector::new(Fails);
        assert_eq!(corrector.correct_or_keep(ORIGINAL, "").await, ORIGINAL);
    }

    #[tokio::test]
    async fn keeps_original_when_entries_are_merged() {
        let merged = "1\n00:00:01,000 --> 00:00:04,000\nola mundo canta comigo\n";
        let corrector = FallbackCorrector::new(Fixed(merged.into()));
        assert_eq!(corrector.correct_or_keep(ORIGINAL, "").await, ORIGINAL);
    }

    #[tokio::test]
    async fn keeps_original_on_chatty_reply() {
        let corrector = FallbackCorrector::new(Fixed("Here is your subtitle!".into()));
        assert_eq!(corrector.correct_or_keep(ORIGINAL, "").await, ORIGINAL);
    }

    #[tokio::test]
    async fn trait_impl_never_errors() {
        let inner: Arc<dyn SubtitleCorrector> = Arc::new(Fails);
        let corrector = FallbackCorrector::new(inner);
        assert!(corrector.correct(ORIGINAL, "").await.is_ok());
    }

    #[test]
    fn validate_reply_recomposes_subrip() {
        let reply = "00:00:01,000 --> 00:00:02,000\nola mundo\n\n\
                     00:00:03,000 --> 00:00:04,000\ncanta comigo";
        let composed = validate_reply(ORIGINAL, reply).expect("valid");
        assert!(composed.starts_with("1\n00:00:01,000"));
        assert!(composed.contains("2\n00:00:03,000"));
    }

    #[tokio::test]
    async fn keeps_original_when_reply_is_retimed() {
        let reply = "1\n00:00:05,000 --> 00:00:02,000\nola mundo\n\n\
                     2\n00:00:01,500 --> 00:00:04,000\ncanta comigo\n\n";
        let corrector = FallbackCorrector::new(Fixed(reply.to_string()));
        assert_eq!(corrector.correct_or_keep(ORIGINAL, "").await, ORIGINAL);
        assert!(matches!(
            validate_reply(ORIGINAL, reply),
            Err(LlmError::InvalidReply(_))
        ));
    }

    #[test]
    fn reply_with_blank_entry_is_rejected() {
        let reply = "1\n00:00:01,000 --> 00:00:02,000\nola mundo\n\n\
                     2\n00:00:03,000 --> 00:00:04,000\n \n\n";
        assert!(validate_reply(ORIGINAL, reply).is_err());
    }
}
