//! Real Whisper transcription service via whisper-rs (whisper.cpp bindings).
//!
//! When compiled with the `whisper` feature, loads a GGML model file once
//! and runs beam-search inference on mono PCM audio. Without the feature,
//! the service constructs fine but every transcription fails.

#[cfg(feature = "whisper")]
use std::path::Path;

use async_trait::async_trait;

use lexi_core::error::LexiError;

#[cfg(feature = "whisper")]
use crate::Segment;
use crate::{TranscriptionResult, TranscriptionService, WhisperConfig};

/// Whisper sample rate.
#[cfg(feature = "whisper")]
const WHISPER_RATE: u32 = 16_000;

/// Whisper transcription service backed by whisper.cpp.
///
/// Holds one loaded model context, reused by every request.
pub struct WhisperService {
    #[cfg(feature = "whisper")]
    ctx: whisper_rs::WhisperContext,
    config: WhisperConfig,
}

impl WhisperService {
    /// Create a new WhisperService by loading a GGML model file.
    ///
    /// # Errors
    /// Returns `LexiError::Transcription` if the model file doesn't exist
    /// or fails to load.
    #[cfg(feature = "whisper")]
    pub fn new(config: WhisperConfig) -> Result<Self, LexiError> {
        use whisper_rs::{WhisperContext, WhisperContextParameters};

        let model_path = &config.model_path;
        if !Path::new(model_path).exists() {
            return Err(LexiError::Transcription(format!(
                "Whisper model file not found: {}",
                model_path
            )));
        }

        tracing::info!(model = %model_path, lang = %config.language, "Loading Whisper model");

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(model_path, params).map_err(|e| {
            LexiError::Transcription(format!("Failed to load Whisper model: {}", e))
        })?;

        tracing::info!("Whisper model loaded successfully");
        Ok(Self { ctx, config })
    }

    /// Stub constructor when the `whisper` feature is disabled.
    #[cfg(not(feature = "whisper"))]
    pub fn new(config: WhisperConfig) -> Result<Self, LexiError> {
        tracing::warn!("WhisperService created without `whisper` feature, transcription will fail");
        Ok(Self { config })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Real implementation (whisper feature enabled)
// ---------------------------------------------------------------------------

#[cfg(feature = "whisper")]
#[async_trait]
impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        audio_data: &[f32],
        sample_rate: u32,
    ) -> Result<TranscriptionResult, LexiError> {
        use whisper_rs::{FullParams, SamplingStrategy};

        if audio_data.is_empty() {
            return Err(LexiError::Transcription(
                "Cannot transcribe empty audio data".into(),
            ));
        }

        if sample_rate == 0 {
            return Err(LexiError::Transcription(
                "Sample rate must be greater than 0".into(),
            ));
        }

        let samples = if sample_rate != WHISPER_RATE {
            resample(audio_data, sample_rate, WHISPER_RATE)
        } else {
            audio_data.to_vec()
        };

        let duration_secs = samples.len() as f32 / WHISPER_RATE as f32;
        tracing::debug!(
            samples = samples.len(),
            duration_secs,
            "Starting Whisper transcription"
        );

        let mut state = self.ctx.create_state().map_err(|e| {
            LexiError::Transcription(format!("Failed to create Whisper state: {}", e))
        })?;

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: self.config.beam_size as i32,
            patience: -1.0,
        });

        let lang = if self.config.language == "auto" {
            None
        } else {
            Some(self.config.language.as_str())
        };
        params.set_language(lang);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &samples)
            .map_err(|e| LexiError::Transcription(format!("Whisper inference failed: {}", e)))?;

        let n_segments = state.full_n_segments().map_err(|e| {
            LexiError::Transcription(format!("Failed to get segment count: {}", e))
        })?;

        let mut segments = Vec::with_capacity(n_segments as usize);
        for i in 0..n_segments {
            let text = state.full_get_segment_text(i).map_err(|e| {
                LexiError::Transcription(format!("Failed to get segment {} text: {}", i, e))
            })?;

            // Timestamps are in centiseconds.
            let t0 = state.full_get_segment_t0(i).map_err(|e| {
                LexiError::Transcription(format!("Failed to get segment {} t0: {}", i, e))
            })?;
            let t1 = state.full_get_segment_t1(i).map_err(|e| {
                LexiError::Transcription(format!("Failed to get segment {} t1: {}", i, e))
            })?;

            segments.push(Segment {
                start: t0 as f32 / 100.0,
                end: t1 as f32 / 100.0,
                text: text.trim().to_string(),
            });
        }

        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(
            segments = n_segments,
            text_len = full_text.len(),
            "Transcription complete"
        );

        Ok(TranscriptionResult {
            text: full_text,
            segments,
            language: lang.unwrap_or("auto").to_string(),
            duration_secs,
        })
    }
}

// ---------------------------------------------------------------------------
// Stub implementation (whisper feature disabled)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "whisper"))]
#[async_trait]
impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        _audio_data: &[f32],
        _sample_rate: u32,
    ) -> Result<TranscriptionResult, LexiError> {
        Err(LexiError::Transcription(
            "Whisper transcription requires the `whisper` feature to be enabled".into(),
        ))
    }
}

/// Linear resampling; adequate for speech going into Whisper.
#[cfg(feature = "whisper")]
fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let idx0 = (src_idx.floor() as usize).min(input.len() - 1);
        let idx1 = (idx0 + 1).min(input.len() - 1);
        let frac = (src_idx - idx0 as f64) as f32;

        output.push(input[idx0] * (1.0 - frac) + input[idx1] * frac);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_service_no_model_file() {
        let config = WhisperConfig {
            model_path: "/nonexistent/model.bin".to_string(),
            ..WhisperConfig::default()
        };
        let result = WhisperService::new(config);
        // Without whisper feature: succeeds (stub). With: fails (no file).
        #[cfg(feature = "whisper")]
        assert!(result.is_err());
        #[cfg(not(feature = "whisper"))]
        assert!(result.is_ok());
    }

    #[cfg(not(feature = "whisper"))]
    #[tokio::test]
    async fn test_whisper_service_stub_returns_error() {
        let service = WhisperService::new(WhisperConfig::default()).unwrap();
        let audio = vec![0.0f32; 16000];
        let result = service.transcribe(&audio, 16000).await;
        assert!(matches!(result, Err(LexiError::Transcription(_))));
        assert!(result.unwrap_err().to_string().contains("whisper"));
    }

    #[cfg(not(feature = "whisper"))]
    #[test]
    fn test_whisper_service_config_accessor() {
        let config = WhisperConfig {
            model_path: "/my/model.bin".to_string(),
            language: "auto".to_string(),
            beam_size: 2,
        };
        let service = WhisperService::new(config).unwrap();
        assert_eq!(service.config().model_path, "/my/model.bin");
        assert_eq!(service.config().beam_size, 2);
    }

    #[cfg(feature = "whisper")]
    #[test]
    fn test_resample_halves_length() {
        let input: Vec<f32> = (0..32000).map(|i| (i % 2) as f32).collect();
        let output = resample(&input, 32000, 16000);
        assert_eq!(output.len(), 16000);
    }
}
