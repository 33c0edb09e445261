//! Database entities.

#![allow(missing_docs)]

pub mod activity_log;
pub mod post;
pub mod post_schedule;
pub mod social_account;
pub mod usage_log;
pub mod workspace_settings;

pub use activity_log::Entity as ActivityLog;
pub use post::Entity as Post;
pub use post_schedule::Entity as PostSchedule;
pub use social_account::Entity as SocialAccount;
pub use usage_log::Entity as UsageLog;
pub use workspace_settings::Entity as WorkspaceSettings;
