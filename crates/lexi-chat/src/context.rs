//! Conversation history windowing and rendering.
//!
//! The window is the bounded, chronological slice of a session's turns that
//! the prompt builder sees. It is derived fresh on every request.

use lexi_core::types::Turn;
use lexi_storage::HistoryStore;

use crate::error::ChatError;

/// Default number of turns the model sees.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Fetch the `limit` most recent turns of a session, oldest first.
///
/// A session with no turns yields an empty window. A `limit` of zero is
/// treated as one.
pub fn window(
    store: &dyn HistoryStore,
    session_id: &str,
    limit: usize,
) -> Result<Vec<Turn>, ChatError> {
    let mut turns = store.recent(session_id, limit.max(1))?;
    turns.reverse();
    Ok(turns)
}

/// Render a window as `"<role>: <content>\n"` lines.
pub fn render_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}\n", t.role, t.content))
        .collect()
}
