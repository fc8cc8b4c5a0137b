//! Health check endpoint.
//!
//! Used by load balancers and monitoring systems to verify the
//! service is running.

use axum::http::StatusCode;

/// Liveness check: 200 OK whenever the process is serving.
///
/// Does not check dependencies; the event store is in-process and the
/// bus degrades gracefully.
///
/// # Endpoint
///
/// ```text
/// GET /healthz
/// ```
#[allow(clippy::unused_async)]
pub async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthz_is_ok() {
        let (status, body) = healthz().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
