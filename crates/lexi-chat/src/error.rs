//! Error types for the tutoring pipeline.

use lexi_core::error::LexiError;

/// Errors from the chat and voice pipelines.
///
/// `ModelCall`: the provider could not be reached or refused the request.
/// `MalformedModelOutput`: it answered, but not with a usable reply.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("transcription error: {0}")]
    Transcription(String),
    #[error("model call error: {0}")]
    ModelCall(String),
    #[error("malformed model output: {0}")]
    MalformedModelOutput(String),
}

impl From<LexiError> for ChatError {
    fn from(err: LexiError) -> Self {
        match err {
            LexiError::Transcription(msg) | LexiError::Audio(msg) => ChatError::Transcription(msg),
            other => ChatError::Persistence(other.to_string()),
        }
    }
}
