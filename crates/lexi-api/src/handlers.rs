//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its input via axum extractors, delegates to the
//! chat or voice pipeline on `AppState`, and returns JSON.

use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use lexi_chat::{score, ChatRequest, FluencyResult, GradedReply, PaceLevel};
use lexi_core::types::{Role, Turn};

use crate::error::ApiError;
use crate::state::AppState;

/// Largest history page a client may request.
const MAX_HISTORY_LIMIT: usize = 100;

const WELCOME_MESSAGE: &str = "Welcome to the AI English Grammar Chatbot API";

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct VoiceChatParams {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub transcript: String,
    /// Accepts integer or fractional milliseconds, rounded like the
    /// multipart field.
    #[serde(default, deserialize_with = "deserialize_duration_ms")]
    pub duration_ms: Option<i64>,
}

fn deserialize_duration_ms<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)?
        .map(duration_from_millis)
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Round a client-reported duration to whole milliseconds.
fn duration_from_millis(value: f64) -> Result<i64, String> {
    if !value.is_finite() || value.abs() > i64::MAX as f64 {
        return Err(format!("duration_ms must be a finite number, got {}", value));
    }
    Ok(value.round() as i64)
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub total_turns: u64,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoiceChatResponse {
    pub transcript: String,
    #[serde(flatten)]
    pub reply: GradedReply,
}

/// Flat fluency view; pace fields are null when no duration was known.
#[derive(Debug, Serialize, Deserialize)]
pub struct FluencyResponse {
    pub fluency_score: Option<u8>,
    pub level: Option<PaceLevel>,
    pub word_count: usize,
    pub filler_count: Option<u32>,
    pub wpm: Option<f64>,
    pub duration_ms: Option<i64>,
}

impl From<FluencyResult> for FluencyResponse {
    fn from(result: FluencyResult) -> Self {
        Self {
            fluency_score: result.fluency_score(),
            level: result.level(),
            wpm: result.wpm(),
            word_count: result.word_count,
            filler_count: result.filler_count,
            duration_ms: result.duration_ms,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub transcript: String,
    #[serde(flatten)]
    pub fluency: FluencyResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TurnResponse {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Turn> for TurnResponse {
    fn from(turn: Turn) -> Self {
        Self {
            id: turn.id,
            role: turn.role,
            content: turn.content,
            created_at: turn.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<TurnResponse>,
}

// =============================================================================
// Multipart helpers
// =============================================================================

struct AudioUpload {
    bytes: Vec<u8>,
    duration_ms: Option<i64>,
}

/// Pull `audio_file` and the optional `duration_ms` field out of a form.
async fn read_audio_upload(mut multipart: Multipart) -> Result<AudioUpload, ApiError> {
    let mut bytes = None;
    let mut duration_ms = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("audio_file") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read audio: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            Some("duration_ms") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))?;
                let text = text.trim();
                if !text.is_empty() {
                    let value = text.parse::<f64>().map_err(|_| {
                        ApiError::BadRequest(format!("duration_ms must be a number, got '{}'", text))
                    })?;
                    duration_ms =
                        Some(duration_from_millis(value).map_err(ApiError::BadRequest)?);
                }
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| ApiError::BadRequest("Missing 'audio_file' field".into()))?;
    Ok(AudioUpload { bytes, duration_ms })
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET / - welcome message.
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let total_turns = state.turns.total().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to count turns for health check");
        0
    });

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        total_turns,
        model: state.config.llm.model.clone(),
    })
}

/// POST /chat - grade one sentence and continue the conversation.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<GradedReply>, ApiError> {
    let reply = state
        .orchestrator
        .handle_turn(&req.session_id, &req.user_input)
        .await?;
    Ok(Json(reply))
}

/// POST /chat/voice?session_id= - transcribe a recording, then run it as a turn.
pub async fn chat_voice(
    State(state): State<AppState>,
    Query(params): Query<VoiceChatParams>,
    multipart: Multipart,
) -> Result<Json<VoiceChatResponse>, ApiError> {
    let upload = read_audio_upload(multipart).await?;
    let transcript = state.voice.transcribe_upload(&upload.bytes).await?;

    tracing::debug!(session_id = %params.session_id, "Voice turn transcribed");

    let reply = state
        .orchestrator
        .handle_turn(&params.session_id, &transcript.text)
        .await?;

    Ok(Json(VoiceChatResponse {
        transcript: transcript.text,
        reply,
    }))
}

/// GET /chat/{session_id}/history - chronological recent turns.
pub async fn history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(state.orchestrator.history_limit())
        .clamp(1, MAX_HISTORY_LIMIT);

    let turns = state.orchestrator.history(&session_id, limit)?;

    Ok(Json(HistoryResponse {
        session_id,
        turns: turns.into_iter().map(TurnResponse::from).collect(),
    }))
}

/// POST /voice/transcribe - transcribe a recording and score its pace.
pub async fn voice_transcribe(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let upload = read_audio_upload(multipart).await?;
    let result = state
        .voice
        .transcribe_and_score(&upload.bytes, upload.duration_ms)
        .await?;

    Ok(Json(TranscribeResponse {
        transcript: result.transcript,
        fluency: result.fluency.into(),
    }))
}

/// POST /voice/score - score an existing transcript.
pub async fn voice_score(Json(req): Json<ScoreRequest>) -> Json<FluencyResponse> {
    Json(score(&req.transcript, req.duration_ms).into())
}
