//! Turn orchestrator: the single entry point for a text turn.
//!
//! Sequence per turn: persist the user turn, window the history (which now
//! includes that turn), build the prompt, call the model once, extract the
//! graded reply, persist the assistant turn. Any failure after the first
//! append leaves the user turn in place; nothing is rolled back.

use std::sync::Arc;

use lexi_core::config::ChatConfig;
use lexi_core::types::{Role, Turn};
use lexi_storage::HistoryStore;

use crate::context::{render_history, window};
use crate::error::ChatError;
use crate::llm::ChatModel;
use crate::parser::extract_graded_reply;
use crate::prompt::{build_prompt, PromptInput};
use crate::types::GradedReply;

/// Maximum session id length in characters.
pub const MAX_SESSION_ID_LENGTH: usize = 128;

/// Coordinates history, prompt, model and extraction for one turn.
pub struct TurnOrchestrator {
    store: Arc<dyn HistoryStore>,
    model: Arc<dyn ChatModel>,
    history_limit: usize,
    max_message_length: usize,
}

impl TurnOrchestrator {
    pub fn new(store: Arc<dyn HistoryStore>, model: Arc<dyn ChatModel>, config: &ChatConfig) -> Self {
        Self {
            store,
            model,
            history_limit: config.history_limit.max(1),
            max_message_length: config.max_message_length,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Run one conversational turn and return the model's graded reply.
    ///
    /// Input is validated before anything is written. On success exactly two
    /// turns are appended; when the model call or extraction fails only the
    /// user turn is.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        user_input: &str,
    ) -> Result<GradedReply, ChatError> {
        self.validate(session_id, user_input)?;

        self.store.append(session_id, Role::User, user_input)?;

        let turns = window(self.store.as_ref(), session_id, self.history_limit)?;
        let history_text = render_history(&turns);
        let prompt = build_prompt(&PromptInput {
            history_text: &history_text,
            user_input,
        });

        tracing::debug!(
            session_id = %session_id,
            window = turns.len(),
            prompt_len = prompt.len(),
            "Calling tutor model"
        );

        let raw = self.model.complete(&prompt).await.map_err(|e| {
            tracing::warn!(session_id = %session_id, error = %e, "Model call failed");
            e
        })?;

        let reply = extract_graded_reply(&raw).map_err(|e| {
            tracing::warn!(session_id = %session_id, error = %e, "Model reply rejected");
            e
        })?;

        self.store
            .append(session_id, Role::Assistant, &reply.chat_reply)?;

        tracing::info!(
            session_id = %session_id,
            has_error = reply.has_error,
            categories = reply.error_categories.len(),
            "Turn complete"
        );

        Ok(reply)
    }

    /// Chronological history for a session, at most `limit` turns.
    pub fn history(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, ChatError> {
        validate_session_id(session_id)?;
        window(self.store.as_ref(), session_id, limit)
    }

    fn validate(&self, session_id: &str, user_input: &str) -> Result<(), ChatError> {
        validate_session_id(session_id)?;
        if user_input.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if user_input.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }
        Ok(())
    }
}

fn validate_session_id(session_id: &str) -> Result<(), ChatError> {
    if session_id.trim().is_empty() {
        return Err(ChatError::InvalidSessionId(
            "session id cannot be empty".to_string(),
        ));
    }
    if session_id.chars().count() > MAX_SESSION_ID_LENGTH {
        return Err(ChatError::InvalidSessionId(format!(
            "session id exceeds {} characters",
            MAX_SESSION_ID_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lexi_core::error::LexiError;
    use lexi_storage::{Database, TurnRepository};
    use std::sync::Mutex;

    const REPLY: &str = r#"{"has_error": true, "error_categories": ["subject-verb agreement"], "explanation": "Untuk subjek 'He', gunakan 'goes'.", "corrected_sentence": "He goes to school.", "chat_reply": "What is your favourite subject?"}"#;

    /// Model that answers with a fixed result and records every prompt.
    struct ScriptedModel {
        answer: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(msg: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(msg.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answer.clone().map_err(ChatError::ModelCall)
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    impl HistoryStore for BrokenStore {
        fn append(&self, _: &str, _: Role, _: &str) -> Result<Turn, LexiError> {
            Err(LexiError::Storage("database is locked".to_string()))
        }

        fn recent(&self, _: &str, _: usize) -> Result<Vec<Turn>, LexiError> {
            Ok(Vec::new())
        }
    }

    fn setup(model: Arc<ScriptedModel>) -> (TurnOrchestrator, Arc<TurnRepository>) {
        let repo = Arc::new(TurnRepository::new(Arc::new(Database::in_memory().unwrap())));
        let orchestrator = TurnOrchestrator::new(repo.clone(), model, &ChatConfig::default());
        (orchestrator, repo)
    }

    #[tokio::test]
    async fn test_first_turn_end_to_end() {
        let model = ScriptedModel::ok(REPLY);
        let (orchestrator, repo) = setup(model.clone());

        let reply = orchestrator.handle_turn("s1", "He go to school.").await.unwrap();
        assert!(reply.has_error);
        assert_eq!(reply.corrected_sentence, "He goes to school.");

        let turns = repo.recent("s1", 10).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::Assistant);
        assert_eq!(turns[0].content, "What is your favourite subject?");
        assert_eq!(turns[1].role, Role::User);
        assert_eq!(turns[1].content, "He go to school.");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Conversation history:\nuser: He go to school.\n"));
        assert!(prompts[0].contains("User sentence:\n\"He go to school.\""));
        assert_eq!(prompts[0].matches("He go to school.").count(), 2);
    }

    #[tokio::test]
    async fn test_second_turn_sees_previous_exchange() {
        let model = ScriptedModel::ok(REPLY);
        let (orchestrator, _repo) = setup(model.clone());

        orchestrator.handle_turn("s1", "He go to school.").await.unwrap();
        orchestrator.handle_turn("s1", "I likes math.").await.unwrap();

        let prompts = model.prompts();
        assert!(prompts[1].contains(
            "user: He go to school.\nassistant: What is your favourite subject?\nuser: I likes math.\n"
        ));
    }

    #[tokio::test]
    async fn test_model_failure_keeps_only_user_turn() {
        let (orchestrator, repo) = setup(ScriptedModel::failing("HTTP 503"));

        let err = orchestrator.handle_turn("s1", "Hello").await.unwrap_err();
        assert!(matches!(err, ChatError::ModelCall(_)));

        let turns = repo.recent("s1", 10).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_malformed_reply_keeps_only_user_turn() {
        let (orchestrator, repo) = setup(ScriptedModel::ok("Sorry, I cannot help with that."));

        let err = orchestrator.handle_turn("s1", "Hello").await.unwrap_err();
        assert!(matches!(err, ChatError::MalformedModelOutput(_)));
        assert_eq!(repo.count("s1").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_skips_model() {
        let model = ScriptedModel::ok(REPLY);
        let orchestrator =
            TurnOrchestrator::new(Arc::new(BrokenStore), model.clone(), &ChatConfig::default());

        let err = orchestrator.handle_turn("s1", "Hello").await.unwrap_err();
        assert!(matches!(err, ChatError::Persistence(_)));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_window_is_bounded() {
        let model = ScriptedModel::ok(REPLY);
        let (orchestrator, repo) = setup(model.clone());

        for i in 0..4 {
            orchestrator
                .handle_turn("s1", &format!("sentence number {}", i))
                .await
                .unwrap();
        }
        assert_eq!(repo.count("s1").unwrap(), 8);

        let last = model.prompts().pop().unwrap();
        let history = last
            .split("Conversation history:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nUser sentence:").next())
            .unwrap()
            .trim_end();
        assert_eq!(history.lines().count(), 5);
        assert!(!history.contains("sentence number 0"));
        assert!(history.starts_with("user: sentence number 1"));
        assert!(history.ends_with("user: sentence number 3"));
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_history() {
        let model = ScriptedModel::ok(REPLY);
        let (orchestrator, _repo) = setup(model.clone());

        orchestrator.handle_turn("alice", "I has a dog.").await.unwrap();
        orchestrator.handle_turn("bob", "She run fast.").await.unwrap();

        let prompts = model.prompts();
        assert!(!prompts[1].contains("I has a dog."));
    }

    #[tokio::test]
    async fn test_validation_rejects_before_persisting() {
        let model = ScriptedModel::ok(REPLY);
        let (orchestrator, repo) = setup(model.clone());

        assert!(matches!(
            orchestrator.handle_turn("s1", "   ").await,
            Err(ChatError::EmptyMessage)
        ));
        assert!(matches!(
            orchestrator.handle_turn("", "Hello").await,
            Err(ChatError::InvalidSessionId(_))
        ));
        assert!(matches!(
            orchestrator.handle_turn(&"x".repeat(129), "Hello").await,
            Err(ChatError::InvalidSessionId(_))
        ));
        assert!(matches!(
            orchestrator.handle_turn("s1", &"a".repeat(2001)).await,
            Err(ChatError::MessageTooLong(2000))
        ));

        assert_eq!(repo.total().unwrap(), 0);
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_chronological() {
        let (orchestrator, _repo) = setup(ScriptedModel::ok(REPLY));
        orchestrator.handle_turn("s1", "He go to school.").await.unwrap();

        let turns = orchestrator.history("s1", 5).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert!(orchestrator.history("", 5).is_err());
    }
}
