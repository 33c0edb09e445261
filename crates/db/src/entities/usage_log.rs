//! Usage log entity (append-only).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Metered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum UsageResource {
    #[sea_orm(string_value = "ai_request")]
    AiRequest,
    #[sea_orm(string_value = "post_creation")]
    PostCreation,
}

impl UsageResource {
    /// Stored tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AiRequest => "ai_request",
            Self::PostCreation => "post_creation",
        }
    }
}

/// One consumed unit of a metered resource.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "usage_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub user_id: String,

    pub resource: UsageResource,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
