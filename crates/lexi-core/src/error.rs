use thiserror::Error;

/// Top-level error type for the Lexi system.
///
/// Each variant covers a subsystem below the chat layer. The chat crate
/// converts these into its own taxonomy so that callers can tell storage
/// failures from transcription failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LexiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LexiError {
    fn from(err: toml::de::Error) -> Self {
        LexiError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LexiError {
    fn from(err: serde_json::Error) -> Self {
        LexiError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Lexi operations.
pub type Result<T> = std::result::Result<T, LexiError>;
