//! Liveness check

/// `GET /health/ping`
pub async fn ping() -> &'static str {
    "PONG"
}
