//! Social account entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Provider an account is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum SocialProvider {
    #[sea_orm(string_value = "facebook_page")]
    FacebookPage,
    #[sea_orm(string_value = "instagram")]
    Instagram,
    #[sea_orm(string_value = "zalo")]
    Zalo,
}

impl SocialProvider {
    /// Stored tag, as used in `post.providers`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FacebookPage => "facebook_page",
            Self::Instagram => "instagram",
            Self::Zalo => "zalo",
        }
    }
}

/// Connection state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[sea_orm(string_value = "connected")]
    Connected,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "disconnected")]
    Disconnected,
}

/// A workspace's connection to a provider account (page, business account, OA).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "social_account")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub workspace_id: String,

    pub provider: SocialProvider,

    /// Page id, Instagram business account id, or OA id.
    pub provider_id: String,

    pub name: String,

    pub status: AccountStatus,

    /// Access token sealed by the credential vault.
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub token_encrypted: Option<String>,

    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    /// Provider-specific extras.
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
