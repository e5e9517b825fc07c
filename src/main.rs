//! Entry point of the `karaoke` binary.
//!
//! # Startup sequence
//!
//! 1. Load `.env` (API keys) and initialise logging.
//! 2. Parse the command line and load [`AppConfig`] (defaults on first run).
//! 3. Build the stage collaborators from the configuration.
//! 4. Run the orchestrator on a tokio runtime and print the video path.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use karaoke_pipeline::{
    artifacts::ArtifactNamespace,
    cli::Cli,
    config::{AppConfig, AppPaths},
    llm::{ApiCorrector, SubtitleCorrector},
    pipeline::{Collaborators, PipelineOrchestrator},
    stages::{CommandAligner, DemucsSeparator, FfmpegRenderer, YtDlpAcquirer},
    stt::{ModelPaths, TranscribeParams, WhisperEngine},
};

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(error) = run() {
        eprintln!("error: {error}");
        for cause in error.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::new();
    let settings_file = cli.config.clone().unwrap_or_else(|| paths.settings_file.clone());
    let config = AppConfig::load_from(&settings_file)?;

    if cli.write_config {
        config
            .save_to(&settings_file)
            .with_context(|| format!("writing {}", settings_file.display()))?;
        println!("{}", settings_file.display());
        return Ok(());
    }

    let request = cli.to_request(&config)?;
    let namespace = ArtifactNamespace::new(cli.workspace_root(&config));
    let collaborators = build_collaborators(&config, &paths, cli.lyrics.is_some());
    let orchestrator = PipelineOrchestrator::new(namespace, collaborators);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    let video = rt.block_on(orchestrator.run(request))?;

    println!("{}", video.display());
    Ok(())
}

fn build_collaborators(config: &AppConfig, paths: &AppPaths, wants_correction: bool) -> Collaborators {
    let model_path = ModelPaths::new(config.stt.models_dir(paths)).resolve(&config.stt.model);
    let stt_params = TranscribeParams {
        language: config.stt.language.clone(),
        use_gpu: config.stt.use_gpu,
        ..TranscribeParams::default()
    };
    log::debug!("whisper model: {}", model_path.display());

    let corrector: Option<Arc<dyn SubtitleCorrector>> = if config.llm.is_active() {
        if wants_correction && config.llm.resolved_api_key().is_none() {
            log::warn!(
                "no API key for subtitle correction (set one of {}); it will be skipped",
                karaoke_pipeline::config::LlmConfig::API_KEY_VARS.join(", ")
            );
        }
        Some(Arc::new(ApiCorrector::from_config(&config.llm)))
    } else {
        None
    };

    Collaborators {
        acquirer: Arc::new(YtDlpAcquirer::new(config.acquire.clone())),
        separator: Arc::new(DemucsSeparator::new(config.separation.clone())),
        transcriber: Arc::new(WhisperEngine::new(model_path, stt_params)),
        aligner: Arc::new(CommandAligner::new(config.align.clone())),
        renderer: Arc::new(FfmpegRenderer::new(config.render.clone())),
        corrector,
    }
}
