//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex so that every statement,
//! and in particular every turn append, runs to completion before another
//! caller can observe the table.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use lexi_core::error::LexiError;

use crate::migrations;

/// Thread-safe SQLite handle shared by all sessions.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Configures WAL mode and runs all pending migrations.
    pub fn new(path: &Path) -> Result<Self, LexiError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| LexiError::Storage(format!("Failed to open database: {}", e)))?;
        let db = Self::configure(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, LexiError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LexiError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, LexiError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| LexiError::Storage(format!("Failed to set pragmas: {}", e)))?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure, so a multi-statement
    /// closure is atomic with respect to other callers of this handle.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LexiError>
    where
        F: FnOnce(&Connection) -> Result<T, LexiError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LexiError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_count(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))
                .map_err(|e| LexiError::Storage(e.to_string()))
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(message_count(&db), 0);
    }

    #[test]
    fn test_file_database_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lexi.db");
        let db = Database::new(&path).unwrap();

        assert_eq!(message_count(&db), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexi.db");

        {
            let db = Database::new(&path).unwrap();
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO messages (session_id, role, content, created_at)
                     VALUES ('s1', 'user', 'hi', 1)",
                    [],
                )
                .map_err(|e| LexiError::Storage(e.to_string()))?;
                Ok(())
            })
            .unwrap();
        }

        let db = Database::new(&path).unwrap();
        assert_eq!(message_count(&db), 1);
    }

    #[test]
    fn test_wal_mode_enabled() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode", [], |row| row.get(0))
                .map_err(|e| LexiError::Storage(e.to_string()))?;
            // In-memory databases report "memory" instead of "wal".
            assert!(
                mode == "wal" || mode == "memory",
                "Expected wal or memory, got: {}",
                mode
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_with_conn_propagates_closure_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), LexiError> =
            db.with_conn(|_| Err(LexiError::Storage("boom".to_string())));
        assert!(matches!(result, Err(LexiError::Storage(msg)) if msg == "boom"));
    }
}
