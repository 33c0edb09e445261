//! Usage quota endpoints.

use axum::{Json, Router, extract::State, routing::post};
use chrono::Utc;
use serde::Deserialize;
use socialcast_common::{AppError, AppResult};
use socialcast_core::{Role, UsageDecision, UsageStats};
use socialcast_db::entities::usage_log::UsageResource;

use crate::middleware::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRequest {
    pub user_id: String,
    pub role: Role,
    pub resource: UsageResource,
}

impl UsageRequest {
    fn validated(self) -> AppResult<Self> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::Validation("userId is required".to_string()));
        }
        Ok(self)
    }
}

/// Consume one unit; 429 with the decision as `details` when denied.
async fn consume(
    State(state): State<AppState>,
    Json(req): Json<UsageRequest>,
) -> AppResult<Json<UsageDecision>> {
    let req = req.validated()?;
    let decision = state
        .usage_limiter
        .check_and_consume(&req.user_id, req.role, req.resource, Utc::now())
        .await?;

    if !decision.allowed {
        let details =
            serde_json::to_value(&decision).map_err(|e| AppError::Internal(e.to_string()))?;
        return Err(AppError::RateLimited(details));
    }
    Ok(Json(decision))
}

async fn stats(
    State(state): State<AppState>,
    Json(req): Json<UsageRequest>,
) -> AppResult<Json<UsageStats>> {
    let req = req.validated()?;
    let stats = state
        .usage_limiter
        .stats(&req.user_id, req.role, req.resource, Utc::now())
        .await?;
    Ok(Json(stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/consume", post(consume))
        .route("/stats", post(stats))
}
