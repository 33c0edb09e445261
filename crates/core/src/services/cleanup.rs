//! Retention cleanup of fully published posts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use serde_json::json;
use socialcast_common::{AppError, AppResult};
use socialcast_db::entities::post;
use socialcast_db::entities::post_schedule::{self, ScheduleStatus};
use socialcast_db::entities::workspace_settings;
use socialcast_db::repositories::{
    PostRepository, PostScheduleRepository, WorkspaceSettingsRepository,
};
use tracing::{error, info};

use super::activity::{ActivityEntry, ActivityService, actions};

/// Totals of one cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    /// Workspaces with auto-delete enabled.
    pub workspaces_checked: u64,
    /// Workspaces where at least one post was deleted.
    pub workspaces_cleaned: u64,
    /// Posts deleted across all workspaces.
    pub posts_deleted: u64,
    /// Workspaces whose transaction failed and was rolled back.
    pub failed_workspaces: u64,
}

/// Posts whose schedules were all published strictly before `cutoff`.
/// Posts without schedules are never eligible.
#[must_use]
pub fn eligible_post_ids(
    posts: &[post::Model],
    schedules: &[post_schedule::Model],
    cutoff: DateTime<Utc>,
) -> Vec<String> {
    let mut by_post: HashMap<&str, Vec<&post_schedule::Model>> = HashMap::new();
    for schedule in schedules {
        by_post
            .entry(schedule.post_id.as_str())
            .or_default()
            .push(schedule);
    }

    posts
        .iter()
        .filter(|p| {
            by_post.get(p.id.as_str()).is_some_and(|list| {
                !list.is_empty()
                    && list.iter().all(|s| {
                        s.status == ScheduleStatus::Published
                            && s.published_at
                                .is_some_and(|at| at.with_timezone(&Utc) < cutoff)
                    })
            })
        })
        .map(|p| p.id.clone())
        .collect()
}

/// Deletes old published posts of workspaces that opted in.
#[derive(Clone)]
pub struct CleanupService {
    db: Arc<DatabaseConnection>,
    settings: WorkspaceSettingsRepository,
    posts: PostRepository,
    schedules: PostScheduleRepository,
    activity: ActivityService,
}

impl CleanupService {
    /// Create a new cleanup service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        settings: WorkspaceSettingsRepository,
        posts: PostRepository,
        schedules: PostScheduleRepository,
        activity: ActivityService,
    ) -> Self {
        Self {
            db,
            settings,
            posts,
            schedules,
            activity,
        }
    }

    /// Clean every workspace with auto-delete enabled. A failing workspace is
    /// logged and skipped.
    pub async fn run(&self, now: DateTime<Utc>) -> AppResult<CleanupSummary> {
        let workspaces = self.settings.find_auto_delete_enabled().await?;
        let mut summary = CleanupSummary::default();

        for settings in &workspaces {
            summary.workspaces_checked += 1;
            match self.cleanup_workspace(settings, now).await {
                Ok(0) => {}
                Ok(deleted) => {
                    summary.workspaces_cleaned += 1;
                    summary.posts_deleted += deleted;
                }
                Err(e) => {
                    summary.failed_workspaces += 1;
                    error!(workspace_id = %settings.workspace_id, error = %e, "Workspace cleanup failed");
                }
            }
        }

        info!(
            workspaces_checked = summary.workspaces_checked,
            workspaces_cleaned = summary.workspaces_cleaned,
            posts_deleted = summary.posts_deleted,
            failed_workspaces = summary.failed_workspaces,
            "Cleanup finished"
        );
        Ok(summary)
    }

    /// Delete eligible posts of one workspace. Returns the number of posts
    /// deleted.
    pub async fn cleanup_workspace(
        &self,
        settings: &workspace_settings::Model,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        if !settings.auto_delete_enabled {
            return Ok(0);
        }

        let cutoff = now - Duration::days(i64::from(settings.retention_days.max(0)));
        let posts = self
            .posts
            .find_published_by_workspace(&settings.workspace_id)
            .await?;
        if posts.is_empty() {
            return Ok(0);
        }

        let post_ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();
        let schedules = self.schedules.find_by_post_ids(&post_ids).await?;
        let eligible = eligible_post_ids(&posts, &schedules, cutoff);
        if eligible.is_empty() {
            return Ok(0);
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Schedules first so no schedule outlives its post
        let schedules_deleted = PostScheduleRepository::delete_by_post_ids(&txn, &eligible).await?;
        let posts_deleted = PostRepository::delete_by_ids(&txn, &eligible).await?;

        self.activity
            .record_with(
                &txn,
                ActivityEntry {
                    workspace_id: settings.workspace_id.clone(),
                    user_id: None,
                    action: actions::WORKSPACE_CLEANUP,
                    entity_type: "workspace",
                    entity_id: settings.workspace_id.clone(),
                    details: json!({
                        "postsDeleted": posts_deleted,
                        "schedulesDeleted": schedules_deleted,
                        "retentionDays": settings.retention_days,
                        "cutoff": cutoff.to_rfc3339(),
                    }),
                },
                now,
            )
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        info!(
            workspace_id = %settings.workspace_id,
            posts_deleted,
            schedules_deleted,
            "Deleted expired posts"
        );
        Ok(posts_deleted)
    }
}
