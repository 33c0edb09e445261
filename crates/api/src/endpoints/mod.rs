//! API endpoints.

mod cron;
mod health;
mod usage;

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::middleware::AppState;

/// Create the API router.
///
/// `request_timeout` bounds the quick endpoints. Cron triggers run a whole
/// pass and are left unbounded.
pub fn router(request_timeout: Duration) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/usage", usage::router())
        .layer(TimeoutLayer::new(request_timeout))
        .nest("/api/cron", cron::router())
}
