//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Post status. Once scheduled, this is a rollup of the post's schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Not yet scheduled.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// At least one schedule is still outstanding.
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    /// Every schedule has been published.
    #[sea_orm(string_value = "published")]
    Published,
    /// At least one schedule failed permanently.
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// A logical post fanned out to several social accounts.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning workspace.
    #[sea_orm(indexed)]
    pub workspace_id: String,

    /// Author.
    pub user_id: String,

    /// Optional title (used as the Zalo article title).
    #[sea_orm(nullable)]
    pub title: Option<String>,

    /// Post body, may contain lightweight markdown.
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Ordered media URLs (JSON array of strings).
    #[sea_orm(column_type = "JsonBinary")]
    pub media_urls: Json,

    /// Requested providers (JSON array of provider tags).
    #[sea_orm(column_type = "JsonBinary")]
    pub providers: Json,

    /// Current status.
    pub status: PostStatus,

    /// Requested publish time.
    #[sea_orm(nullable)]
    pub scheduled_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Media URLs in order. Non-string entries are ignored.
    #[must_use]
    pub fn media_url_list(&self) -> Vec<String> {
        json_string_list(&self.media_urls)
    }

    /// Requested provider tags.
    #[must_use]
    pub fn provider_list(&self) -> Vec<String> {
        json_string_list(&self.providers)
    }
}

fn json_string_list(value: &Json) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post_schedule::Entity")]
    PostSchedule,
}

impl Related<super::post_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostSchedule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
