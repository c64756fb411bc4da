//! Extraction of the graded reply from raw model text.
//!
//! Models sometimes wrap the JSON object in prose or a code fence. The
//! candidate is the span from the first `{` to the last `}`; everything
//! outside it is ignored.

use crate::error::ChatError;
use crate::types::GradedReply;

/// Longest slice of model text echoed back in error messages.
const SNIPPET_LEN: usize = 120;

/// Locate and parse the single embedded [`GradedReply`] in `raw`.
///
/// Fails when there is no `{ ... }` span, when the span is not valid JSON,
/// or when any of the five fields is missing or has the wrong type.
/// Extra fields are ignored.
pub fn extract_graded_reply(raw: &str) -> Result<GradedReply, ChatError> {
    let candidate = json_span(raw).ok_or_else(|| {
        ChatError::MalformedModelOutput(format!(
            "no JSON object found in model output: {:?}",
            snippet(raw)
        ))
    })?;

    serde_json::from_str::<GradedReply>(candidate).map_err(|e| {
        tracing::debug!(error = %e, candidate = %snippet(candidate), "Model output rejected");
        ChatError::MalformedModelOutput(format!("invalid reply object: {}", e))
    })
}

fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn snippet(text: &str) -> &str {
    match text.char_indices().nth(SNIPPET_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
