//! Social account repository.

use std::sync::Arc;

use crate::entities::{SocialAccount, social_account};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use socialcast_common::{AppError, AppResult};

/// Social account repository for database operations.
#[derive(Clone)]
pub struct SocialAccountRepository {
    db: Arc<DatabaseConnection>,
}

impl SocialAccountRepository {
    /// Create a new social account repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an account by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<social_account::Model>> {
        SocialAccount::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find accounts by IDs. Missing IDs are simply absent from the result.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<social_account::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        SocialAccount::find()
            .filter(social_account::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new account.
    pub async fn create(
        &self,
        model: social_account::ActiveModel,
    ) -> AppResult<social_account::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
