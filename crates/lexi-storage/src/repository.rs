//! Conversation history persistence.
//!
//! [`HistoryStore`] is the append/query contract the chat pipeline depends
//! on; [`TurnRepository`] implements it on top of the SQLite messages table.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use lexi_core::error::LexiError;
use lexi_core::types::{Role, Turn};

use crate::db::Database;

/// Append-only log of conversation turns keyed by session.
pub trait HistoryStore: Send + Sync {
    /// Persist one turn and return it with its assigned id and timestamp.
    ///
    /// The append is atomic: readers see either the whole turn or nothing.
    fn append(&self, session_id: &str, role: Role, content: &str) -> Result<Turn, LexiError>;

    /// The `limit` most recent turns for a session, most recent first.
    fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, LexiError>;
}

/// SQLite-backed [`HistoryStore`].
pub struct TurnRepository {
    db: Arc<Database>,
}

impl TurnRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Count all turns stored for a session.
    pub fn count(&self, session_id: &str) -> Result<u64, LexiError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
                    rusqlite::params![session_id],
                    |row| row.get(0),
                )
                .map_err(|e| LexiError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    /// Count all turns across every session.
    pub fn total(&self) -> Result<u64, LexiError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                .map_err(|e| LexiError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

impl HistoryStore for TurnRepository {
    fn append(&self, session_id: &str, role: Role, content: &str) -> Result<Turn, LexiError> {
        self.db.with_conn(|conn| {
            // Clamp to the session's latest timestamp so created_at never
            // goes backwards when the wall clock does.
            let latest: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(created_at), 0) FROM messages WHERE session_id = ?1",
                    rusqlite::params![session_id],
                    |row| row.get(0),
                )
                .map_err(|e| LexiError::Storage(format!("Failed to read latest turn: {}", e)))?;
            let created_at = Utc::now().timestamp_millis().max(latest);

            conn.execute(
                "INSERT INTO messages (session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![session_id, role.as_str(), content, created_at],
            )
            .map_err(|e| LexiError::Storage(format!("Failed to save turn: {}", e)))?;

            Ok(Turn {
                id: conn.last_insert_rowid(),
                session_id: session_id.to_string(),
                role,
                content: content.to_string(),
                created_at: millis_to_datetime(created_at)?,
            })
        })
    }

    fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, LexiError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, role, content, created_at
                     FROM messages
                     WHERE session_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2",
                )
                .map_err(|e| LexiError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![session_id, limit as i64], |row| {
                    Ok(row_to_turn(row))
                })
                .map_err(|e| LexiError::Storage(e.to_string()))?;

            let mut turns = Vec::new();
            for row in rows {
                let turn = row.map_err(|e| LexiError::Storage(e.to_string()))??;
                turns.push(turn);
            }
            Ok(turns)
        })
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn row_to_turn(row: &rusqlite::Row<'_>) -> Result<Turn, LexiError> {
    let id: i64 = row.get(0).map_err(|e| LexiError::Storage(e.to_string()))?;
    let session_id: String = row.get(1).map_err(|e| LexiError::Storage(e.to_string()))?;
    let role: String = row.get(2).map_err(|e| LexiError::Storage(e.to_string()))?;
    let content: String = row.get(3).map_err(|e| LexiError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(4).map_err(|e| LexiError::Storage(e.to_string()))?;

    Ok(Turn {
        id,
        session_id,
        role: role.parse()?,
        content,
        created_at: millis_to_datetime(created_at)?,
    })
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, LexiError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| LexiError::Storage(format!("Invalid timestamp: {}", ms)))
}
