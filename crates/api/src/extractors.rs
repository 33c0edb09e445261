//! Request extractors.

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use socialcast_common::AppError;

use crate::middleware::AppState;

/// Caller of a cron trigger, authenticated by the shared bearer secret.
///
/// When no secret is configured every caller is accepted.
#[derive(Debug, Clone, Copy)]
pub struct CronCaller;

impl FromRequestParts<AppState> for CronCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.cron_secret.as_deref() else {
            return Ok(Self);
        };

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match token {
            Some(token) if token == secret => Ok(Self),
            _ => {
                tracing::warn!(path = %parts.uri.path(), "Rejected cron trigger");
                Err(AppError::Unauthorized)
            }
        }
    }
}
