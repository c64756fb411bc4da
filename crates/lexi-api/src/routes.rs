//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Body limit for JSON endpoints.
const JSON_BODY_LIMIT: usize = 64 * 1024;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Browsers may call from any local dev server port.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            is_local_origin(origin)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let limiter = RateLimiter::new(state.config.api.rate_limit_per_sec);
    let upload_limit = state.config.voice.max_upload_bytes;

    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/chat/{session_id}/history", get(handlers::history))
        .route(
            "/voice/score",
            post(handlers::voice_score).layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        );

    // Routes that reach the model provider or the transcription engine.
    let rate_limited_routes = Router::new()
        .route(
            "/chat",
            post(handlers::chat).layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
        )
        .route("/chat/voice", post(handlers::chat_voice))
        .route("/voice/voice", post(handlers::chat_voice))
        .route("/voice/transcribe", post(handlers::voice_transcribe))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(limiter));

    public_routes
        .merge(rate_limited_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn is_local_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    let host = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
        .unwrap_or("");
    let host = host.split(':').next().unwrap_or("");
    matches!(host, "localhost" | "127.0.0.1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_origins_allowed() {
        for origin in [
            "http://localhost:5173",
            "http://127.0.0.1:8000",
            "http://localhost",
            "https://localhost:3000",
        ] {
            assert!(is_local_origin(&HeaderValue::from_static(origin)), "{}", origin);
        }
    }

    #[test]
    fn test_remote_origins_rejected() {
        for origin in [
            "http://example.com",
            "http://localhost.evil.com",
            "null",
            "file://",
        ] {
            assert!(!is_local_origin(&HeaderValue::from_static(origin)), "{}", origin);
        }
    }
}
