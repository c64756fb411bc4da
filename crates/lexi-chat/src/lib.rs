//! Grammar-tutor conversation pipeline.
//!
//! History windowing, prompt construction, model calls, reply extraction,
//! the turn orchestrator, fluency scoring and the voice pipeline.

pub mod context;
pub mod error;
pub mod fluency;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod types;
pub mod voice;

pub use context::{render_history, window, DEFAULT_HISTORY_LIMIT};
pub use error::ChatError;
pub use fluency::{count_words, score, FluencyResult, PaceLevel, PaceMetrics};
pub use llm::{ChatModel, OpenRouterClient, MODEL_TEMPERATURE};
pub use orchestrator::TurnOrchestrator;
pub use parser::extract_graded_reply;
pub use prompt::{build_prompt, PromptInput};
pub use types::{ChatRequest, GradedReply};
pub use voice::{Transcript, VoicePipeline, VoiceTranscript};
