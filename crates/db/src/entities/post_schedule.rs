//! Post schedule entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Publish lifecycle of one post-to-account fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Waiting to be claimed.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Claimed by a dispatcher invocation.
    #[sea_orm(string_value = "publishing")]
    Publishing,
    /// Published on the provider.
    #[sea_orm(string_value = "published")]
    Published,
    /// Failed permanently.
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// A schedule publishing one post to one social account.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post_schedule")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub post_id: String,

    /// Target account. Not a foreign key: accounts may be removed independently.
    pub social_account_id: String,

    /// When the schedule becomes due. Moved forward on retry.
    #[sea_orm(indexed)]
    pub scheduled_at: DateTimeWithTimeZone,

    pub status: ScheduleStatus,

    /// Transient failures so far.
    #[sea_orm(default_value = 0)]
    pub retry_count: i32,

    /// Dispatcher pass holding the row while it is `publishing`.
    #[sea_orm(nullable)]
    pub claimed_by: Option<String>,

    #[sea_orm(nullable)]
    pub published_at: Option<DateTimeWithTimeZone>,

    /// Provider-side id of the published post.
    #[sea_orm(nullable)]
    pub external_post_id: Option<String>,

    /// Reason for a permanent failure.
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    /// Stamped on every status transition.
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
