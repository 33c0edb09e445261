//! Activity log entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An audit entry written by the publishing pipeline.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub workspace_id: String,

    /// Acting user, if any. Pipeline entries have none.
    #[sea_orm(nullable)]
    pub user_id: Option<String>,

    /// Dotted action name, e.g. `schedule.publish_failed`.
    pub action: String,

    pub entity_type: String,

    pub entity_id: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub details: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
