//! Per-user usage quotas.
//!
//! Consulted by collaborators before content reaches the publishing pipeline.
//! The check and the increment are one conditional insert, serialized per
//! `(user, resource)`, so concurrent requests cannot overshoot a ceiling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use socialcast_common::{AppResult, IdGenerator, LimitsConfig, RoleLimits};
use socialcast_db::entities::usage_log::UsageResource;
use socialcast_db::repositories::{UsageCounts, UsageLogRepository};
use tracing::{debug, info};

/// Ceiling value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// Subscription role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Free tier.
    Free,
    /// Paid individual tier.
    Professional,
    /// Unlimited tier.
    Enterprise,
}

/// Daily and monthly ceilings for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
    /// Ceiling for the current UTC day.
    pub daily: i64,
    /// Ceiling for the current UTC month.
    pub monthly: i64,
}

impl Quota {
    /// No ceiling in either window.
    pub const UNLIMITED: Self = Self {
        daily: UNLIMITED,
        monthly: UNLIMITED,
    };

    /// A window with a zero ceiling can never be consumed.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.daily == 0 || self.monthly == 0
    }
}

/// Ceilings for every role and resource.
#[derive(Debug, Clone)]
pub struct UsageLimits {
    config: LimitsConfig,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

impl UsageLimits {
    /// Create from configuration.
    #[must_use]
    pub const fn new(config: LimitsConfig) -> Self {
        Self { config }
    }

    /// Quota for a role and resource. Negative values are unlimited.
    #[must_use]
    pub const fn quota(&self, role: Role, resource: UsageResource) -> Quota {
        let limits: &RoleLimits = match role {
            Role::Free => &self.config.free,
            Role::Professional => &self.config.professional,
            Role::Enterprise => &self.config.enterprise,
        };
        match resource {
            UsageResource::AiRequest => Quota {
                daily: limits.ai_daily,
                monthly: limits.ai_monthly,
            },
            UsageResource::PostCreation => Quota {
                daily: limits.posts_daily,
                monthly: limits.posts_monthly,
            },
        }
    }
}

/// Usage against a quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    /// Units consumed today.
    pub daily: i64,
    /// Units consumed this month.
    pub monthly: i64,
    /// Daily ceiling, `-1` when unlimited.
    pub daily_limit: i64,
    /// Monthly ceiling, `-1` when unlimited.
    pub monthly_limit: i64,
}

impl UsageStats {
    const fn new(counts: UsageCounts, quota: Quota) -> Self {
        Self {
            daily: counts.daily,
            monthly: counts.monthly,
            daily_limit: quota.daily,
            monthly_limit: quota.monthly,
        }
    }
}

/// Result of a consume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageDecision {
    /// Whether a unit was consumed.
    pub allowed: bool,
    /// Usage after the attempt.
    pub usage: UsageStats,
}

/// Enforces usage quotas.
#[derive(Clone)]
pub struct UsageLimiter {
    repo: UsageLogRepository,
    limits: UsageLimits,
    id_gen: IdGenerator,
}

impl UsageLimiter {
    /// Create a new usage limiter.
    #[must_use]
    pub const fn new(repo: UsageLogRepository, limits: UsageLimits) -> Self {
        Self {
            repo,
            limits,
            id_gen: IdGenerator::new(),
        }
    }

    /// Consume one unit if the quota allows it. Denied requests are not
    /// counted.
    pub async fn check_and_consume(
        &self,
        user_id: &str,
        role: Role,
        resource: UsageResource,
        now: DateTime<Utc>,
    ) -> AppResult<UsageDecision> {
        let quota = self.limits.quota(role, resource);

        if quota.is_blocked() {
            let counts = self.repo.counts(user_id, resource, now).await?;
            debug!(user_id, resource = resource.as_str(), "Usage denied by zero quota");
            return Ok(UsageDecision {
                allowed: false,
                usage: UsageStats::new(counts, quota),
            });
        }

        let (allowed, counts) = self
            .repo
            .try_consume(
                &self.id_gen.generate(),
                user_id,
                resource,
                now,
                quota.daily,
                quota.monthly,
            )
            .await?;

        if !allowed {
            info!(
                user_id,
                resource = resource.as_str(),
                daily = counts.daily,
                monthly = counts.monthly,
                "Usage limit reached"
            );
        }

        Ok(UsageDecision {
            allowed,
            usage: UsageStats::new(counts, quota),
        })
    }

    /// Current usage without consuming.
    pub async fn stats(
        &self,
        user_id: &str,
        role: Role,
        resource: UsageResource,
        now: DateTime<Utc>,
    ) -> AppResult<UsageStats> {
        let counts = self.repo.counts(user_id, resource, now).await?;
        Ok(UsageStats::new(counts, self.limits.quota(role, resource)))
    }
}
