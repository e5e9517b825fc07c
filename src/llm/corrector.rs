//! `SubtitleCorrector` trait and the HTTP implementation.
//!
//! `ApiCorrector` talks either to the Gemini `generateContent` API or to any
//! OpenAI-compatible `/v1/chat/completions` endpoint, depending on
//! [`LlmConfig::provider`].  Connection details all come from [`LlmConfig`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{LlmConfig, LlmProvider};
use crate::llm::prompt::{strip_code_fence, PromptBuilder};

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Correction failures.  The pipeline always recovers from these by keeping
/// the uncorrected subtitle.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("correction request timed out")]
    Timeout,

    #[error("correction service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse correction response: {0}")]
    Parse(String),

    /// No text came back, typically a blocked or truncated generation.
    #[error("correction service returned no text ({0})")]
    EmptyResponse(String),

    #[error("no API key configured (set llm.api_key or one of {vars})")]
    MissingApiKey { vars: String },

    #[error("correction is disabled")]
    Disabled,

    /// The reply is not a usable subtitle.
    #[error("unusable corrected subtitle: {0}")]
    InvalidReply(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// SubtitleCorrector trait
// ---------------------------------------------------------------------------

/// Corrects SubRip text against a reference lyric document.
#[async_trait]
pub trait SubtitleCorrector: Send + Sync {
    async fn correct(&self, subtitle: &str, lyrics: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl<T: SubtitleCorrector + ?Sized> SubtitleCorrector for Arc<T> {
    async fn correct(&self, subtitle: &str, lyrics: &str) -> Result<String, LlmError> {
        (**self).correct(subtitle, lyrics).await
    }
}

// ---------------------------------------------------------------------------
// ApiCorrector
// ---------------------------------------------------------------------------

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct ApiCorrector {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
    prompt_builder: PromptBuilder,
}

impl ApiCorrector {
    /// Build from config.  The API key is resolved once, here.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            api_key: config.resolved_api_key(),
            prompt_builder: PromptBuilder::new(),
        }
    }

    /// JSON body of a Gemini `generateContent` request.
    pub fn gemini_body(&self, subtitle: &str, lyrics: &str) -> Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": self.prompt_builder.build(subtitle, lyrics) }]
            }],
            "generationConfig": {
                "temperature":     self.config.temperature,
                "topP":            self.config.top_p,
                "maxOutputTokens": self.config.max_output_tokens
            }
        });
        if self.config.relax_safety_filters {
            body["safetySettings"] = SAFETY_CATEGORIES
                .iter()
                .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
                .collect();
        }
        body
    }

    /// JSON body of a chat-completions request.
    pub fn chat_body(&self, subtitle: &str, lyrics: &str) -> Value {
        let (system_msg, user_msg) = self.prompt_builder.build_chat(subtitle, lyrics);
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "top_p":       self.config.top_p,
            "max_tokens":  self.config.max_output_tokens
        })
    }

    async fn post(&self, request: reqwest::RequestBuilder) -> Result<Value, LlmError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))
    }

    async fn correct_gemini(&self, subtitle: &str, lyrics: &str) -> Result<String, LlmError> {
        let key = self.api_key.as_deref().ok_or_else(missing_key)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&self.gemini_body(subtitle, lyrics));
        gemini_text(&self.post(request).await?)
    }

    async fn correct_chat(&self, subtitle: &str, lyrics: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut request = self.client.post(&url).json(&self.chat_body(subtitle, lyrics));
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        let json = self.post(request).await?;
        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::EmptyResponse("no message content".into()))?;
        non_empty(text)
    }
}

fn missing_key() -> LlmError {
    LlmError::MissingApiKey {
        vars: LlmConfig::API_KEY_VARS.join(", "),
    }
}

fn non_empty(text: &str) -> Result<String, LlmError> {
    let text = strip_code_fence(text);
    if text.is_empty() {
        Err(LlmError::EmptyResponse("blank text".into()))
    } else {
        Ok(text.to_string())
    }
}

/// Concatenate the text parts of the first Gemini candidate.
///
/// A missing candidate or part carries the finish reason (or the prompt
/// block reason) into the error.
pub fn gemini_text(json: &Value) -> Result<String, LlmError> {
    let candidate = &json["candidates"][0];
    let parts = candidate["content"]["parts"].as_array();
    let text: String = parts
        .into_iter()
        .flatten()
        .filter_map(|p| p["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        let reason = candidate["finishReason"]
            .as_str()
            .or_else(|| json["promptFeedback"]["blockReason"].as_str())
            .unwrap_or("unknown");
        return Err(LlmError::EmptyResponse(format!("finish reason {reason}")));
    }
    non_empty(&text)
}

#[async_trait]
impl SubtitleCorrector for ApiCorrector {
    async fn correct(&self, subtitle: &str, lyrics: &str) -> Result<String, LlmError> {
        if !self.config.is_active() {
            return Err(LlmError::Disabled);
        }
        log::info!(
            "llm: requesting subtitle correction from {} ({:?})",
            self.config.model,
            self.config.provider
        );
        match self.config.provider {
            LlmProvider::Gemini => self.correct_gemini(subtitle, lyrics).await,
            LlmProvider::OpenAiCompatible => self.correct_chat(subtitle, lyrics).await,
            LlmProvider::Disabled => Err(LlmError::Disabled),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: Some("test-key".into()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn gemini_body_carries_generation_settings() {
        let corrector = ApiCorrector::from_config(&make_config(LlmProvider::Gemini));
        let body = corrector.gemini_body("SRT", "LYRICS");

        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["generationConfig"]["topP"], 1.0);
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().expect("text");
        assert!(prompt.contains("LYRICS") && prompt.contains("SRT"));
        let safety = body["safetySettings"].as_array().expect("safety");
        assert_eq!(safety.len(), 4);
        assert!(safety.iter().all(|s| s["threshold"] == "BLOCK_NONE"));
    }

    #[test]
    fn safety_settings_are_optional() {
        let mut config = make_config(LlmProvider::Gemini);
        config.relax_safety_filters = false;
        let body = ApiCorrector::from_config(&config).gemini_body("a", "b");
        assert!(body.get("safetySettings").is_none());
    }

    #[test]
    fn chat_body_uses_configured_model() {
        let mut config = make_config(LlmProvider::OpenAiCompatible);
        config.model = "gpt-4o-mini".into();
        let body = ApiCorrector::from_config(&config).chat_body("a", "b");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["max_tokens"], 8192);
    }

    #[test]
    fn gemini_text_joins_parts_and_strips_fences() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "```srt\n1\n" }, { "text": "00:00:01,000 --> 00:00:02,000\nola\n```" }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            gemini_text(&json).expect("text"),
            "1\n00:00:01,000 --> 00:00:02,000\nola"
        );
    }

    #[test]
    fn gemini_text_reports_finish_reason() {
        let json = json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] });
        let err = gemini_text(&json).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));

        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(gemini_text(&blocked).unwrap_err().to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn disabled_provider_is_an_error() {
        let corrector = ApiCorrector::from_config(&make_config(LlmProvider::Disabled));
        let err = corrector.correct("a", "b").await.unwrap_err();
        assert!(matches!(err, LlmError::Disabled));
    }

    #[test]
    fn corrector_is_object_safe() {
        let corrector: Arc<dyn SubtitleCorrector> =
            Arc::new(ApiCorrector::from_config(&make_config(LlmProvider::Gemini)));
        drop(corrector);
    }
}
