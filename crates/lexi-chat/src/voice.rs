//! Voice pipeline: uploaded audio to transcript, and transcript to score.
//!
//! WAV, Ogg and WebM uploads are accepted; the container is detected from
//! the bytes. The transcription engine is injected so the binary decides
//! between whisper.cpp and a mock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use lexi_whisper::{AudioDecoder, AudioFormat, TranscriptionService};

use crate::error::ChatError;
use crate::fluency::{score, FluencyResult};

/// A transcript together with the decoded audio length.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub audio_duration_ms: i64,
}

/// Transcript plus fluency metrics for one recording.
#[derive(Debug, Clone)]
pub struct VoiceTranscript {
    pub transcript: String,
    pub fluency: FluencyResult,
}

/// Turns uploaded recordings into text.
pub struct VoicePipeline {
    transcriber: Arc<dyn TranscriptionService>,
    decoder: AudioDecoder,
    upload_dir: Option<PathBuf>,
}

impl VoicePipeline {
    pub fn new(transcriber: Arc<dyn TranscriptionService>) -> Self {
        Self {
            transcriber,
            decoder: AudioDecoder::default(),
            upload_dir: None,
        }
    }

    pub fn with_decoder(mut self, decoder: AudioDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Keep a copy of every upload as `<dir>/<uuid>.<ext>`, where the
    /// extension follows the detected container.
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(dir.into());
        self
    }

    pub fn upload_dir(&self) -> Option<&Path> {
        self.upload_dir.as_deref()
    }

    /// Decode an upload and transcribe it.
    pub async fn transcribe_upload(&self, bytes: &[u8]) -> Result<Transcript, ChatError> {
        if bytes.is_empty() {
            return Err(ChatError::Transcription("audio upload is empty".to_string()));
        }

        let audio = self.decoder.decode(bytes).await?;
        if let Some(dir) = &self.upload_dir {
            save_upload(dir, bytes, AudioFormat::sniff(bytes)).await?;
        }

        let result = self
            .transcriber
            .transcribe(&audio.samples, audio.sample_rate)
            .await?;

        let text = result.text.trim().to_string();
        tracing::info!(
            audio_ms = audio.duration_ms(),
            segments = result.segments.len(),
            chars = text.len(),
            "Audio transcribed"
        );

        Ok(Transcript {
            text,
            audio_duration_ms: audio.duration_ms(),
        })
    }

    /// Transcribe and score an upload.
    ///
    /// `duration_ms` is the client-measured speaking time; when absent the
    /// decoded audio length is used instead.
    pub async fn transcribe_and_score(
        &self,
        bytes: &[u8],
        duration_ms: Option<i64>,
    ) -> Result<VoiceTranscript, ChatError> {
        let transcript = self.transcribe_upload(bytes).await?;
        let duration = duration_ms.or(Some(transcript.audio_duration_ms));
        let fluency = score(&transcript.text, duration);
        Ok(VoiceTranscript {
            transcript: transcript.text,
            fluency,
        })
    }
}

async fn save_upload(
    dir: &Path,
    bytes: &[u8],
    format: AudioFormat,
) -> Result<PathBuf, ChatError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ChatError::Persistence(format!("failed to create upload dir: {}", e)))?;
    let path = dir.join(format!("{}.{}", Uuid::new_v4(), format.extension()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ChatError::Persistence(format!("failed to save upload: {}", e)))?;
    tracing::debug!(path = %path.display(), "Saved audio upload");
    Ok(path)
}
