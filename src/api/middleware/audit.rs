//! Audit logging middleware.
//!
//! Logs every API request with a request id, method, path, caller and
//! response status. Runs innermost (after auth has injected `CurrentUser`).

use std::time::{Duration, Instant};

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::api::types::CurrentUser;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_id = req.extensions().get::<CurrentUser>().map(|u| u.0.id);
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let latency_ms = millis(started.elapsed());
    if response.status().is_server_error() {
        tracing::warn!(%request_id, %method, path, user = ?user_id, status, latency_ms, "request failed");
    } else {
        tracing::info!(%request_id, %method, path, user = ?user_id, status, latency_ms, "request");
    }
    response
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_is_whole_milliseconds() {
        assert_eq!(millis(Duration::from_micros(2_999)), 2);
        assert_eq!(millis(Duration::from_secs(3)), 3_000);
    }

    #[test]
    fn latency_saturates_instead_of_wrapping() {
        assert_eq!(millis(Duration::MAX), u64::MAX);
        assert_eq!(millis(Duration::from_millis(u64::MAX)), u64::MAX);
    }
}
