//! Cron trigger endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::post,
};
use chrono::Utc;
use serde::Deserialize;
use socialcast_common::{AppError, AppResult};
use socialcast_core::{CleanupSummary, DispatchSummary};

use crate::{extractors::CronCaller, middleware::AppState};

/// Largest batch a single trigger may ask for.
const MAX_LIMIT: u64 = 500;

#[derive(Debug, Deserialize)]
pub struct PublishQuery {
    pub limit: Option<u64>,
}

/// Run one dispatcher pass.
///
/// The pass runs on its own task: a caller that disconnects mid-pass does not
/// abort publishes between the provider call and the outcome write.
async fn publish(
    _caller: CronCaller,
    State(state): State<AppState>,
    Query(query): Query<PublishQuery>,
) -> AppResult<Json<DispatchSummary>> {
    let limit = query.limit.map(|l| l.min(MAX_LIMIT));
    let dispatcher = state.dispatcher.clone();
    let summary = tokio::spawn(async move { dispatcher.run_once(limit).await })
        .await
        .map_err(|e| AppError::Internal(format!("Dispatcher pass aborted: {e}")))??;
    Ok(Json(summary))
}

/// Run workspace cleanup.
async fn cleanup(
    _caller: CronCaller,
    State(state): State<AppState>,
) -> AppResult<Json<CleanupSummary>> {
    let cleanup = state.cleanup_service.clone();
    let summary = tokio::spawn(async move { cleanup.run(Utc::now()).await })
        .await
        .map_err(|e| AppError::Internal(format!("Cleanup pass aborted: {e}")))??;
    Ok(Json(summary))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/publish", post(publish))
        .route("/cleanup", post(cleanup))
}
