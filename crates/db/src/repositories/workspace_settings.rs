//! Workspace settings repository.

use std::sync::Arc;

use crate::entities::{WorkspaceSettings, workspace_settings};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use socialcast_common::{AppError, AppResult};

/// Workspace settings repository for database operations.
#[derive(Clone)]
pub struct WorkspaceSettingsRepository {
    db: Arc<DatabaseConnection>,
}

impl WorkspaceSettingsRepository {
    /// Create a new workspace settings repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find settings of a workspace.
    pub async fn find_by_workspace(
        &self,
        workspace_id: &str,
    ) -> AppResult<Option<workspace_settings::Model>> {
        WorkspaceSettings::find_by_id(workspace_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all workspaces that opted into automatic deletion.
    pub async fn find_auto_delete_enabled(&self) -> AppResult<Vec<workspace_settings::Model>> {
        WorkspaceSettings::find()
            .filter(workspace_settings::Column::AutoDeleteEnabled.eq(true))
            .order_by_asc(workspace_settings::Column::WorkspaceId)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    #[tokio::test]
    async fn test_find_auto_delete_enabled() {
        let settings = workspace_settings::Model {
            workspace_id: "ws1".to_string(),
            auto_delete_enabled: true,
            retention_days: 30,
            timezone: "Asia/Ho_Chi_Minh".to_string(),
            golden_hours: json!(["09:00", "20:00"]),
            rate_limit_per_minute: 60,
            notify_on_success: false,
            notify_on_failure: true,
            created_at: Utc::now().into(),
            updated_at: None,
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![settings]])
                .into_connection(),
        );

        let repo = WorkspaceSettingsRepository::new(db);
        let enabled = repo.find_auto_delete_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].retention_days, 30);
    }
}
