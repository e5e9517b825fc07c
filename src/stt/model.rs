//! Whisper model registry and path resolution.
//!
//! `stt.model` in the settings is either a registry id (`"large-v3"`) or a
//! path to a GGML file.  [`ModelPaths::resolve`] turns it into a file path.

use std::path::{Path, PathBuf};

/// Static metadata for one GGML model file.
#[derive(Debug)]
pub struct ModelInfo {
    /// Id used in `stt.model` (e.g. `"large-v3"`).
    pub id: &'static str,
    /// File name under the models directory.
    pub file_name: &'static str,
    /// Approximate file size in megabytes.
    pub file_size_mb: u64,
    pub source_url: &'static str,
}

const GGML_SOURCE: &str = "https://huggingface.co/ggerganov/whisper.cpp";

/// Multilingual whisper.cpp models.
pub const WHISPER_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "tiny",
        file_name: "ggml-tiny.bin",
        file_size_mb: 75,
        source_url: GGML_SOURCE,
    },
    ModelInfo {
        id: "base",
        file_name: "ggml-base.bin",
        file_size_mb: 142,
        source_url: GGML_SOURCE,
    },
    ModelInfo {
        id: "small",
        file_name: "ggml-small.bin",
        file_size_mb: 466,
        source_url: GGML_SOURCE,
    },
    ModelInfo {
        id: "medium",
        file_name: "ggml-medium.bin",
        file_size_mb: 1_500,
        source_url: GGML_SOURCE,
    },
    ModelInfo {
        id: "large-v2",
        file_name: "ggml-large-v2.bin",
        file_size_mb: 2_900,
        source_url: GGML_SOURCE,
    },
    ModelInfo {
        id: "large-v3",
        file_name: "ggml-large-v3.bin",
        file_size_mb: 2_900,
        source_url: GGML_SOURCE,
    },
];

pub fn find_model_by_id(id: &str) -> Option<&'static ModelInfo> {
    WHISPER_MODELS.iter().find(|m| m.id == id)
}

// ---------------------------------------------------------------------------
// ModelPaths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ModelPaths {
    /// Directory holding GGML `.bin` files.
    pub models_dir: PathBuf,
}

impl ModelPaths {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn model_path(&self, model: &ModelInfo) -> PathBuf {
        self.models_dir.join(model.file_name)
    }

    /// Resolve a configured model to a file path.
    ///
    /// Registry ids map into the models directory.  Anything else is taken as
    /// a path; relative paths are joined onto the models directory unless
    /// they already exist relative to the working directory.
    pub fn resolve(&self, model: &str) -> PathBuf {
        if let Some(info) = find_model_by_id(model) {
            return self.model_path(info);
        }
        let candidate = Path::new(model);
        if candidate.is_absolute() || candidate.exists() {
            candidate.to_path_buf()
        } else {
            self.models_dir.join(candidate)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
