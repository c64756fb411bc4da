//! Database schema migrations.
//!
//! Creates the schema_migrations bookkeeping table and the append-only
//! messages table that holds every conversation turn.

use rusqlite::Connection;
use tracing::info;

use lexi_core::error::LexiError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), LexiError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| LexiError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| LexiError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: messages");
    }

    Ok(())
}

/// Version 1: conversation messages.
///
/// `created_at` is epoch milliseconds. The autoincrement id orders turns
/// written within the same millisecond.
fn apply_v1(conn: &Connection) -> Result<(), LexiError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id  TEXT NOT NULL,
            role        TEXT NOT NULL
                        CHECK (role IN ('user', 'assistant')),
            content     TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session_recent
            ON messages (session_id, created_at DESC, id DESC);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'messages');
        ",
    )
    .map_err(|e| LexiError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
