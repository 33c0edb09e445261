//! Activity log repository.

use std::sync::Arc;

use crate::entities::activity_log;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection};
use socialcast_common::{AppError, AppResult};

/// Activity log repository. Write-only from the pipeline's point of view.
#[derive(Clone)]
pub struct ActivityLogRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityLogRepository {
    /// Create a new activity log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append an entry.
    pub async fn create(&self, model: activity_log::ActiveModel) -> AppResult<activity_log::Model> {
        Self::create_with(self.db.as_ref(), model).await
    }

    /// Append an entry on the given connection or transaction.
    pub async fn create_with<C: ConnectionTrait>(
        conn: &C,
        model: activity_log::ActiveModel,
    ) -> AppResult<activity_log::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
