//! Configuration: `AppConfig` with one section per collaborator, `AppPaths`
//! for platform directories, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AcquireConfig, AlignConfig, AppConfig, LlmConfig, LlmProvider, RenderConfig,
    SeparationConfig, SttConfig, WorkspaceConfig,
};
