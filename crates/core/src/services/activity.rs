//! Activity log sink.

use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, Set};
use serde_json::Value;
use socialcast_common::{AppResult, IdGenerator};
use socialcast_db::entities::activity_log;
use socialcast_db::repositories::ActivityLogRepository;
use tracing::warn;

/// Action names written by the pipeline.
pub mod actions {
    /// A post failed pre-publish validation.
    pub const VALIDATION_FAILED: &str = "schedule.validation_failed";
    /// A schedule failed permanently.
    pub const PUBLISH_FAILED: &str = "schedule.publish_failed";
    /// Retention cleanup deleted posts of a workspace.
    pub const WORKSPACE_CLEANUP: &str = "workspace.cleanup";
}

/// One activity entry before it is written.
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    /// Workspace the entry belongs to.
    pub workspace_id: String,
    /// Acting user, `None` for the pipeline itself.
    pub user_id: Option<String>,
    /// One of [`actions`].
    pub action: &'static str,
    /// Kind of the affected row.
    pub entity_type: &'static str,
    /// Id of the affected row.
    pub entity_id: String,
    /// Free-form JSON context.
    pub details: Value,
}

/// Writes operator-facing activity entries.
#[derive(Clone)]
pub struct ActivityService {
    repo: ActivityLogRepository,
    id_gen: IdGenerator,
}

impl ActivityService {
    /// Create a new activity service.
    #[must_use]
    pub const fn new(repo: ActivityLogRepository) -> Self {
        Self {
            repo,
            id_gen: IdGenerator::new(),
        }
    }

    fn to_model(&self, entry: ActivityEntry, now: DateTime<Utc>) -> activity_log::ActiveModel {
        activity_log::ActiveModel {
            id: Set(self.id_gen.generate()),
            workspace_id: Set(entry.workspace_id),
            user_id: Set(entry.user_id),
            action: Set(entry.action.to_string()),
            entity_type: Set(entry.entity_type.to_string()),
            entity_id: Set(entry.entity_id),
            details: Set(entry.details),
            created_at: Set(now.into()),
        }
    }

    /// Write an entry.
    pub async fn record(&self, entry: ActivityEntry, now: DateTime<Utc>) -> AppResult<()> {
        self.repo.create(self.to_model(entry, now)).await?;
        Ok(())
    }

    /// Write an entry inside a caller's transaction.
    pub async fn record_with<C: ConnectionTrait>(
        &self,
        conn: &C,
        entry: ActivityEntry,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        ActivityLogRepository::create_with(conn, self.to_model(entry, now)).await?;
        Ok(())
    }

    /// Write an entry, logging instead of failing. Activity entries never
    /// block a state transition.
    pub async fn record_best_effort(&self, entry: ActivityEntry, now: DateTime<Utc>) {
        let action = entry.action;
        let entity_id = entry.entity_id.clone();
        if let Err(e) = self.record(entry, now).await {
            warn!(error = %e, action, entity_id = %entity_id, "Failed to write activity entry");
        }
    }
}
