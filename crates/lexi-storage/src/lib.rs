//! Lexi Storage crate - SQLite persistence for conversation history.
//!
//! Provides a WAL-mode SQLite database with migrations and the
//! [`HistoryStore`] implementation used by the chat pipeline.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{HistoryStore, TurnRepository};
