//! Random slowdown middleware, for exercising clients against a slow server.

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use rand::Rng;

const MAX_SLOWDOWN_MS: u64 = 3000;

/// Delays each request by up to three seconds, uniformly distributed.
pub async fn slowdown_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    let delay_ms = rand::rng().random_range(0..=MAX_SLOWDOWN_MS);
    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    next.run(request).await
}
