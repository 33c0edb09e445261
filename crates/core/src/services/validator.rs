//! Pre-publish validation.
//!
//! Runs once per post before any of its claimed schedules is dispatched. A
//! report with errors fails every claimed schedule of the post.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use socialcast_db::entities::post::{self, PostStatus};
use socialcast_db::entities::post_schedule::{self, ScheduleStatus};
use socialcast_db::entities::social_account::{self, AccountStatus};

/// Tokens expiring sooner than this produce a warning.
pub const EXPIRY_WARNING_HOURS: i64 = 24;

/// Outcome of validating one post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Problems that block publishing.
    pub errors: Vec<String>,
    /// Problems worth logging that do not block publishing.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// No hard errors.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors joined for storage in `error_message`.
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors.join("; ")
    }

    fn error(&mut self, message: String) {
        if !self.errors.contains(&message) {
            self.errors.push(message);
        }
    }
}

/// Check that a post and its schedules can be published now.
///
/// `accounts` maps social account id to account. Only `scheduled` posts
/// pass; a post already rolled up as `failed` is rejected with the rest.
#[must_use]
pub fn validate(
    post: &post::Model,
    schedules: &[post_schedule::Model],
    accounts: &HashMap<String, social_account::Model>,
    now: DateTime<Utc>,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if post.status != PostStatus::Scheduled {
        report.error(format!(
            "Post is {}, expected scheduled",
            status_name(post.status)
        ));
    }

    if post.content.trim().is_empty() {
        report.error("Post content is empty".to_string());
    }

    let requested = post.provider_list();
    if requested.is_empty() {
        report.error("No providers selected".to_string());
    }

    let active: Vec<&post_schedule::Model> = schedules
        .iter()
        .filter(|s| matches!(s.status, ScheduleStatus::Pending | ScheduleStatus::Publishing))
        .collect();
    if active.is_empty() {
        report.error("No pending schedules".to_string());
    }

    let warn_before = now + Duration::hours(EXPIRY_WARNING_HOURS);
    let mut seen_providers = BTreeSet::new();
    let mut connected_providers = BTreeSet::new();

    for schedule in active {
        let Some(account) = accounts.get(&schedule.social_account_id) else {
            report.error(format!(
                "Social account {} not found",
                schedule.social_account_id
            ));
            continue;
        };

        let provider = account.provider.as_str();
        seen_providers.insert(provider);

        if !requested.iter().any(|p| p == provider) {
            report.warnings.push(format!(
                "Account '{}' ({provider}) is not among the requested providers",
                account.name
            ));
        }

        if account.status == AccountStatus::Connected {
            connected_providers.insert(provider);
        } else {
            report.error(format!(
                "Account '{}' ({provider}) is {}",
                account.name,
                account_status_name(account.status)
            ));
            continue;
        }

        if account.token_encrypted.as_deref().is_none_or(str::is_empty) {
            report.error(format!("Account '{}' has no access token", account.name));
            continue;
        }

        if let Some(expires_at) = account.expires_at.map(|t| t.with_timezone(&Utc)) {
            if expires_at < now {
                report.error(format!(
                    "Access token for '{}' expired at {}",
                    account.name,
                    expires_at.to_rfc3339()
                ));
            } else if expires_at < warn_before {
                report.warnings.push(format!(
                    "Access token for '{}' expires at {}",
                    account.name,
                    expires_at.to_rfc3339()
                ));
            }
        }
    }

    for provider in seen_providers.difference(&connected_providers) {
        report.error(format!("No connected {provider} account"));
    }

    report
}

const fn status_name(status: PostStatus) -> &'static str {
    match status {
        PostStatus::Draft => "draft",
        PostStatus::Scheduled => "scheduled",
        PostStatus::Published => "published",
        PostStatus::Failed => "failed",
    }
}

const fn account_status_name(status: AccountStatus) -> &'static str {
    match status {
        AccountStatus::Connected => "connected",
        AccountStatus::Expired => "expired",
        AccountStatus::Disconnected => "disconnected",
    }
}
