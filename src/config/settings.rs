//! Settings structs, defaults and TOML persistence.
//!
//! Every section implements `Serialize`, `Deserialize` and `Default`, and a
//! settings file may leave out any section or key to keep its default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// WorkspaceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding the five artifact directories.
    pub root: PathBuf,
    /// Background image for the Render stage, relative to the working
    /// directory unless absolute.
    pub background_image: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            background_image: PathBuf::from("karaoke-hugo.jpg"),
        }
    }
}

// ---------------------------------------------------------------------------
// AcquireConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// Downloader executable (yt-dlp compatible command line).
    pub program: String,
    /// ffmpeg executable used for trimming.
    pub ffmpeg: String,
    /// MP3 quality handed to the downloader's audio extraction.
    pub audio_quality: String,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".into(),
            ffmpeg: "ffmpeg".into(),
            audio_quality: "192K".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SeparationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub program: String,
    /// Pretrained separation model.  `htdemucs_6s` yields six stems.
    pub model: String,
    /// `"cuda"` or `"cpu"`.  CUDA is probed before separation starts.
    pub device: String,
    /// Parallel jobs inside the separator.
    pub jobs: u32,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            program: "demucs".into(),
            model: "htdemucs_6s".into(),
            device: "cuda".into(),
            jobs: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Registry id (`"large-v3"`) or path to a GGML file.
    pub model: String,
    /// ISO-639-1 code, or `"auto"`.
    pub language: String,
    pub use_gpu: bool,
    /// Directory with GGML models.  `None` uses the platform data dir.
    pub models_dir: Option<PathBuf>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "large-v3".into(),
            language: "pt".into(),
            use_gpu: true,
            models_dir: None,
        }
    }
}

impl SttConfig {
    pub fn models_dir(&self, paths: &AppPaths) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(|| paths.models_dir.clone())
    }
}

// ---------------------------------------------------------------------------
// AlignConfig
// ---------------------------------------------------------------------------

/// External forced aligner.
///
/// `args` may use the placeholders `{audio}`, `{segments}`, `{output}`,
/// `{language}` and `{device}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    pub program: String,
    pub language: String,
    pub device: String,
    pub args: Vec<String>,
}

impl Default for AlignConfig {
    fn default() -> Self {
        let args = [
            "--audio",
            "{audio}",
            "--segments",
            "{segments}",
            "--output",
            "{output}",
            "--language",
            "{language}",
            "--device",
            "{device}",
        ];
        Self {
            program: "whisperx-align".into(),
            language: "pt".into(),
            device: "cpu".into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// RenderConfig
// ---------------------------------------------------------------------------

/// Video muxing.
///
/// For NVIDIA hardware encoding set `video_args` to
/// `["-c:v", "h264_nvenc", "-preset", "p4", "-cq", "21", "-rc", "vbr", "-b:v", "5M", "-gpu", "0"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Output width in pixels; height follows the image aspect ratio.
    pub width: u32,
    /// Bitrate of both the combined instrumental and the video's AAC track.
    pub audio_bitrate: String,
    /// Video encoder arguments inserted before the output path.
    pub video_args: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let video_args = ["-c:v", "libx264", "-preset", "medium", "-crf", "23"];
        Self {
            ffmpeg: "ffmpeg".into(),
            ffprobe: "ffprobe".into(),
            width: 1280,
            audio_bitrate: "128k".into(),
            video_args: video_args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// LlmProvider / LlmConfig
// ---------------------------------------------------------------------------

/// Backend used for lyric-guided subtitle correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LlmProvider {
    /// Google Gemini `generateContent` API.
    #[default]
    Gemini,
    /// Any OpenAI-compatible chat completions API.
    OpenAiCompatible,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub base_url: String,
    /// `None` falls back to `GEMINI_API_KEY`, then `KARAOKE_LLM_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    /// Lyrics of long songs overflow smaller limits and come back truncated.
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
    /// Ask the service not to block replies on content grounds.  Song lyrics
    /// routinely trip default content filters.
    pub relax_safety_filters: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::default(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            model: "gemini-2.5-flash".into(),
            temperature: 0.2,
            top_p: 1.0,
            max_output_tokens: 8192,
            timeout_secs: 120,
            relax_safety_filters: true,
        }
    }
}

impl LlmConfig {
    pub const API_KEY_VARS: [&'static str; 2] = ["GEMINI_API_KEY", "KARAOKE_LLM_API_KEY"];

    /// The configured key, else the first non-empty key variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                Self::API_KEY_VARS
                    .iter()
                    .filter_map(|var| std::env::var(var).ok())
                    .find(|k| !k.trim().is_empty())
            })
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.provider != LlmProvider::Disabled
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use karaoke_pipeline::config::AppConfig;
///
/// // Defaults when the file does not exist yet.
/// let config = AppConfig::load().unwrap();
/// assert_eq!(config.separation.model, "htdemucs_6s");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workspace: WorkspaceConfig,
    pub acquire: AcquireConfig,
    pub separation: SeparationConfig,
    pub stt: SttConfig,
    pub align: AlignConfig,
    pub render: RenderConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Load from the platform `settings.toml`; a missing file yields
    /// `AppConfig::default()`.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
