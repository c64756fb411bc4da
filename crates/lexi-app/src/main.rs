//! Lexi server entry point.
//!
//! Loads configuration, opens the history database, builds the model client
//! and transcription engine, and serves the HTTP API.

mod cli;

use std::sync::Arc;

use clap::Parser;

use lexi_api::{create_router, AppState};
use lexi_chat::OpenRouterClient;
use lexi_core::config::LexiConfig;
use lexi_storage::Database;
use lexi_whisper::{MockTranscriptionService, TranscriptionService, WhisperConfig, WhisperService};

use cli::{expand_home, CliArgs};

/// Pick the transcription engine; a missing model degrades to the mock.
fn build_transcriber(config: &LexiConfig, force_mock: bool) -> Arc<dyn TranscriptionService> {
    if force_mock {
        tracing::warn!("Using mock transcription; voice endpoints return canned text");
        return Arc::new(MockTranscriptionService::new());
    }

    let mut whisper_config = WhisperConfig::from(&config.voice);
    whisper_config.model_path = expand_home(&whisper_config.model_path)
        .to_string_lossy()
        .to_string();

    match WhisperService::new(whisper_config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!(error = %e, "Whisper unavailable, falling back to mock transcription");
            Arc::new(MockTranscriptionService::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = CliArgs::parse();

    // Config is read under a bootstrap subscriber so load warnings are
    // visible; the configured log level then drives the real one.
    let config_file = cli.resolve_config_path();
    let bootstrap_level = cli.resolve_log_level().unwrap_or_else(|| "info".to_string());
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&bootstrap_level)),
        )
        .finish();
    let mut config = tracing::subscriber::with_default(bootstrap, || {
        LexiConfig::load_or_default(&config_file)
    });

    let log_level = cli
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting Lexi v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    config.apply_env_overrides();
    if let Some(dir) = cli.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    config.general.port = cli.resolve_port(config.general.port);

    if config.llm.api_key.is_empty() {
        tracing::warn!("No model API key set (OR_API_KEY); chat requests will fail");
    }

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    config.general.data_dir = data_dir.to_string_lossy().to_string();
    config.voice.ffmpeg_path = expand_home(&config.voice.ffmpeg_path)
        .to_string_lossy()
        .to_string();

    let db_path = data_dir.join("lexi.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Collaborators.
    let model = Arc::new(OpenRouterClient::new(config.llm.clone())?);
    tracing::info!(model = %model.model(), "Model client ready");
    let transcriber = build_transcriber(&config, cli.mock_transcription);

    let port = config.general.port;
    let state = AppState::new(config, db, model, transcriber);

    // === API server ===

    let addr = format!("127.0.0.1:{}", port);
    let router = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind, is another instance running?");
            tracing::error!("Try: LEXI_PORT={} lexi", port.saturating_add(1));
            return Err(e.into());
        }
    };

    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router).await?;

    Ok(())
}
