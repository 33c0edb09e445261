//! Repository layer for database access.

mod activity_log;
mod post;
mod post_schedule;
mod social_account;
mod usage_log;
mod workspace_settings;

pub use activity_log::ActivityLogRepository;
pub use post::PostRepository;
pub use post_schedule::PostScheduleRepository;
pub use social_account::SocialAccountRepository;
pub use usage_log::{UsageCounts, UsageLogRepository, day_start, month_start};
pub use workspace_settings::WorkspaceSettingsRepository;
