//! Platform directories, resolved with the `dirs` crate.
//!
//! Config dir (settings):
//!   Linux:   ~/.config/karaoke-pipeline/
//!   macOS:   ~/Library/Application Support/karaoke-pipeline/
//!   Windows: %APPDATA%\karaoke-pipeline\
//!
//! Data dir (whisper models):
//!   Linux:   ~/.local/share/karaoke-pipeline/models/
//!   macOS:   ~/Library/Application Support/karaoke-pipeline/models/
//!   Windows: %LOCALAPPDATA%\karaoke-pipeline\models\

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default location of GGML whisper models.
    pub models_dir: PathBuf,
}

impl AppPaths {
    pub const APP_NAME: &'static str = "karaoke-pipeline";

    /// Resolve all paths, falling back to the current directory when the
    /// platform has no standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir: data_dir.join("models"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
