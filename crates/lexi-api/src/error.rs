//! API error types and JSON error response formatting.
//!
//! Every failure leaves the server as `{error, message}` with a distinct
//! machine-readable code per failure class.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use lexi_chat::ChatError;
use lexi_core::error::LexiError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "model_call_error").
    pub error: String,
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or invalid input.
    BadRequest(String),
    /// 500 - the history store failed.
    Persistence(String),
    /// 422 - audio could not be decoded or transcribed.
    Transcription(String),
    /// 502 - the model provider could not be reached or refused.
    ModelCall(String),
    /// 502 - the model answered with something unusable.
    MalformedModelOutput(String),
    /// 500 - anything else.
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Transcription(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ModelCall(_) | ApiError::MalformedModelOutput(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Persistence(_) => "persistence_error",
            ApiError::Transcription(_) => "transcription_error",
            ApiError::ModelCall(_) => "model_call_error",
            ApiError::MalformedModelOutput(_) => "malformed_model_output",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.code().to_string();
        let message = match self {
            ApiError::BadRequest(msg)
            | ApiError::Persistence(msg)
            | ApiError::Transcription(msg)
            | ApiError::ModelCall(msg)
            | ApiError::MalformedModelOutput(msg)
            | ApiError::Internal(msg) => msg,
        };

        if status.is_server_error() {
            tracing::error!(status = %status, code = %error, message = %message, "Request failed");
        }

        (status, Json(ErrorBody { error, message })).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage
            | ChatError::MessageTooLong(_)
            | ChatError::InvalidSessionId(_) => ApiError::BadRequest(err.to_string()),
            ChatError::Persistence(msg) => ApiError::Persistence(msg),
            ChatError::Transcription(msg) => ApiError::Transcription(msg),
            ChatError::ModelCall(msg) => ApiError::ModelCall(msg),
            ChatError::MalformedModelOutput(msg) => ApiError::MalformedModelOutput(msg),
        }
    }
}

impl From<LexiError> for ApiError {
    fn from(err: LexiError) -> Self {
        match err {
            LexiError::Storage(msg) => ApiError::Persistence(msg),
            LexiError::Audio(msg) | LexiError::Transcription(msg) => ApiError::Transcription(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
