//! Lexi API crate - axum HTTP server for the grammar tutor.
//!
//! Exposes text turns, voice turns, transcription with fluency scoring,
//! conversation history and a health check.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
