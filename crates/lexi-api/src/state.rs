//! Application state shared across all route handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use lexi_chat::{ChatModel, TurnOrchestrator, VoicePipeline};
use lexi_core::config::LexiConfig;
use lexi_storage::{Database, TurnRepository};
use lexi_whisper::{AudioDecoder, TranscriptionService};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LexiConfig>,
    pub turns: Arc<TurnRepository>,
    pub orchestrator: Arc<TurnOrchestrator>,
    pub voice: Arc<VoicePipeline>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the pipeline from its injected collaborators.
    ///
    /// `config.general.data_dir` must already be an absolute or
    /// working-directory-relative path; uploads are kept under
    /// `<data_dir>/audio` when `voice.save_uploads` is set.
    pub fn new(
        config: LexiConfig,
        database: Database,
        model: Arc<dyn ChatModel>,
        transcriber: Arc<dyn TranscriptionService>,
    ) -> Self {
        let turns = Arc::new(TurnRepository::new(Arc::new(database)));
        let orchestrator = TurnOrchestrator::new(turns.clone(), model, &config.chat);

        let mut voice = VoicePipeline::new(transcriber)
            .with_decoder(AudioDecoder::new(&config.voice.ffmpeg_path));
        if config.voice.save_uploads {
            voice = voice.with_upload_dir(Path::new(&config.general.data_dir).join("audio"));
        }

        Self {
            config: Arc::new(config),
            turns,
            orchestrator: Arc::new(orchestrator),
            voice: Arc::new(voice),
            start_time: Instant::now(),
        }
    }
}
