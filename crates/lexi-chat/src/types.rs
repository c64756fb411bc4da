//! Shared data types for the tutoring pipeline.

use serde::{Deserialize, Serialize};

/// The structured verdict a tutor reply carries.
///
/// All five fields are required when parsing model output; a record with a
/// missing or mistyped field is rejected rather than defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedReply {
    pub has_error: bool,
    /// Short labels such as "verb tense"; empty when `has_error` is false.
    pub error_categories: Vec<String>,
    /// Explanation of the mistakes, written in Bahasa Indonesia.
    pub explanation: String,
    pub corrected_sentence: String,
    /// Conversational continuation; this is what gets stored as the
    /// assistant turn.
    pub chat_reply: String,
}

/// Inbound text turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub user_input: String,
}
