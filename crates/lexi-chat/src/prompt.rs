//! Prompt assembly for the grammar tutor.

/// Everything the prompt template needs.
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    /// Rendered conversation window, possibly empty.
    pub history_text: &'a str,
    /// The user's new sentence, inserted verbatim.
    pub user_input: &'a str,
}

/// Merge the fixed tutor instructions with history and the new sentence.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    format!(
        r#"You are a friendly and supportive English grammar tutor and conversational assistant.

Your tasks:
1. Check the user's sentence for grammar or sentence structure mistakes.
2. If there are mistakes, identify the error categories in simple terms.
3. Explain the mistakes clearly and briefly in Bahasa Indonesia.
4. Provide a corrected version of the sentence using natural English.
5. Continue the conversation in a friendly and encouraging way.

Rules:
- Always respond in valid JSON.
- Do not include any text outside the JSON.
- Use Bahasa Indonesia only for the explanation field.

Conversation history:
{history}

User sentence:
"{user_input}"

Respond using this exact JSON format:
{{
  "has_error": boolean,
  "error_categories": array of strings,
  "explanation": string,
  "corrected_sentence": string,
  "chat_reply": string
}}
"#,
        history = input.history_text,
        user_input = input.user_input,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_history_and_input() {
        let prompt = build_prompt(&PromptInput {
            history_text: "user: Hello\nassistant: Hi!\n",
            user_input: "She don't like it.",
        });
        assert!(prompt.contains("Conversation history:\nuser: Hello\nassistant: Hi!\n"));
        assert!(prompt.contains("\"She don't like it.\""));
    }

    #[test]
    fn test_prompt_lists_all_reply_fields() {
        let prompt = build_prompt(&PromptInput {
            history_text: "",
            user_input: "x",
        });
        for field in [
            "\"has_error\"",
            "\"error_categories\"",
            "\"explanation\"",
            "\"corrected_sentence\"",
            "\"chat_reply\"",
        ] {
            assert!(prompt.contains(field), "missing {}", field);
        }
        assert!(prompt.contains("Bahasa Indonesia"));
        assert!(prompt.contains("Do not include any text outside the JSON."));
    }

    #[test]
    fn test_prompt_user_input_is_verbatim() {
        let tricky = "use {braces} and \"quotes\"";
        let prompt = build_prompt(&PromptInput {
            history_text: "",
            user_input: tricky,
        });
        assert!(prompt.contains(tricky));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let input = PromptInput {
            history_text: "user: a\n",
            user_input: "a",
        };
        assert_eq!(build_prompt(&input), build_prompt(&input));
    }
}
