//! Fixed-window rate limiter middleware.
//!
//! Limits requests to a configurable number per second. The window and the
//! count share one atomic word, so a window rollover and the increments
//! racing with it are serialized. Applied to the routes that reach the model
//! provider or the transcription engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ErrorBody;

const COUNT_BITS: u32 = 32;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_sec: u64,
    /// Epoch second of the current window in the high 32 bits, requests
    /// admitted in it in the low 32 bits.
    state: Arc<AtomicU64>,
}

impl RateLimiter {
    /// Allow `max_per_sec` requests per second; zero disables limiting.
    pub fn new(max_per_sec: u64) -> Self {
        Self {
            max_per_sec: max_per_sec.min(COUNT_MASK),
            state: Arc::new(AtomicU64::new(0)),
        }
    }

    fn try_acquire(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.try_acquire_at(now)
    }

    fn try_acquire_at(&self, now: u64) -> bool {
        if self.max_per_sec == 0 {
            return true;
        }

        let window = now & COUNT_MASK;
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let current = state >> COUNT_BITS;
                let count = state & COUNT_MASK;
                if window > current {
                    Some((window << COUNT_BITS) | 1)
                } else if count < self.max_per_sec {
                    // A late caller from an older second counts against
                    // the current window.
                    Some(state + 1)
                } else {
                    None
                }
            })
            .is_ok()
    }
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.try_acquire() {
        next.run(req).await
    } else {
        tracing::debug!(path = %req.uri().path(), "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody {
                error: "too_many_requests".to_string(),
                message: "Rate limit exceeded".to_string(),
            }),
        )
            .into_response()
    }
}
