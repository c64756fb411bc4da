//! Lexi Whisper crate - speech-to-text behind a trait.
//!
//! Provides the [`TranscriptionService`] abstraction, configuration and
//! result types, decoding of uploaded audio, and a mock implementation
//! for testing without loading a real Whisper model.

pub mod audio;
pub mod whisper_service;

use async_trait::async_trait;

use lexi_core::error::LexiError;

pub use audio::{decode_wav, AudioDecoder, AudioFormat, DecodedAudio, TRANSCODE_SAMPLE_RATE};
pub use whisper_service::WhisperService;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Whisper transcription engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the GGML model file.
    pub model_path: String,
    /// Language code for transcription (e.g., "en", "auto").
    pub language: String,
    /// Beam search width.
    pub beam_size: u32,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            language: "en".to_string(),
            beam_size: 5,
        }
    }
}

impl From<&lexi_core::config::VoiceConfig> for WhisperConfig {
    fn from(voice: &lexi_core::config::VoiceConfig) -> Self {
        Self {
            model_path: voice.model_path.clone(),
            language: voice.language.clone(),
            beam_size: voice.beam_size,
        }
    }
}

// =============================================================================
// Result types
// =============================================================================

/// A single time-aligned segment within a transcription.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Start time in seconds from the beginning of the audio.
    pub start: f32,
    /// End time in seconds from the beginning of the audio.
    pub end: f32,
    pub text: String,
}

/// The complete result of a transcription operation.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Segment texts, trimmed and joined with single spaces.
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
    /// Total audio duration in seconds.
    pub duration_secs: f32,
}

// =============================================================================
// Trait
// =============================================================================

/// Service for transcribing audio data to text.
///
/// Held as `Arc<dyn TranscriptionService>` so that the binary decides which
/// engine is loaded and the pipeline only sees the contract.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Transcribe mono PCM samples in [-1.0, 1.0] at `sample_rate` Hz.
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, LexiError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock transcription service that returns a fixed transcript.
///
/// Used for testing and development without a Whisper model. The single
/// segment covers the full audio duration.
#[derive(Debug, Clone)]
pub struct MockTranscriptionService {
    text: String,
}

impl Default for MockTranscriptionService {
    fn default() -> Self {
        Self {
            text: "[mock transcription]".to_string(),
        }
    }
}

impl MockTranscriptionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that answers every request with `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, LexiError> {
        if audio_data.is_empty() {
            return Err(LexiError::Transcription(
                "Cannot transcribe empty audio data".to_string(),
            ));
        }

        if sample_rate == 0 {
            return Err(LexiError::Transcription(
                "Sample rate must be greater than 0".to_string(),
            ));
        }

        let duration_secs = audio_data.len() as f32 / sample_rate as f32;

        tracing::debug!(
            duration_secs = duration_secs,
            sample_rate = sample_rate,
            "Mock transcription generated"
        );

        Ok(TranscriptionResult {
            text: self.text.clone(),
            segments: vec![Segment {
                start: 0.0,
                end: duration_secs,
                text: self.text.clone(),
            }],
            language: "en".to_string(),
            duration_secs,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
