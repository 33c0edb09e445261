//! Workspace settings entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-workspace publishing and retention settings.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "workspace_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub workspace_id: String,

    /// Whether old published posts are deleted automatically.
    pub auto_delete_enabled: bool,

    /// Days a fully published post is kept.
    pub retention_days: i32,

    /// IANA timezone name.
    pub timezone: String,

    /// Preferred posting times. Advisory only.
    #[sea_orm(column_type = "JsonBinary")]
    pub golden_hours: Json,

    pub rate_limit_per_minute: i32,

    pub notify_on_success: bool,

    pub notify_on_failure: bool,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
