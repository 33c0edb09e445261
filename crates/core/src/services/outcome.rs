//! Outcome recording and retry policy.
//!
//! This is the only place a schedule leaves `publishing`, and the only place
//! a permanent failure is decided. Every write is conditional on the row still
//! being in `publishing` under the caller's claim, so a recorder never
//! overwrites a row it lost.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use socialcast_common::{AppResult, RetryConfig};
use socialcast_db::entities::post::PostStatus;
use socialcast_db::entities::post_schedule::{self, ScheduleStatus};
use socialcast_db::repositories::{PostRepository, PostScheduleRepository};
use tracing::{info, warn};

use super::activity::{ActivityEntry, ActivityService, actions};

/// When and how often transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed before a transient failure becomes permanent.
    pub max_retries: i32,
    /// Delay before the first retry. Zero means the next dispatcher pass.
    pub initial_delay: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Build from configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(0),
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            multiplier: config.multiplier,
            max_delay: Duration::from_secs(config.max_delay_secs),
        }
    }

    /// Whether a failure at `retry_count` earns another attempt.
    #[must_use]
    pub const fn should_retry(&self, retry_count: i32, is_transient: bool) -> bool {
        is_transient && retry_count < self.max_retries
    }

    /// Delay before the attempt following `retry_count` previous retries.
    #[must_use]
    pub fn backoff(&self, retry_count: i32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let factor = self.multiplier.max(1.0).powi(retry_count.max(0));
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Post status derived from its schedules.
///
/// Published only when every schedule is published, failed as soon as any
/// schedule failed permanently, scheduled otherwise.
#[must_use]
pub fn rollup_status(statuses: &[ScheduleStatus]) -> PostStatus {
    if statuses.contains(&ScheduleStatus::Failed) {
        PostStatus::Failed
    } else if !statuses.is_empty() && statuses.iter().all(|s| *s == ScheduleStatus::Published) {
        PostStatus::Published
    } else {
        PostStatus::Scheduled
    }
}

/// What the recorder did with a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordedOutcome {
    /// Marked published.
    Published,
    /// Put back to `pending`.
    #[serde(rename_all = "camelCase")]
    Requeued {
        /// Retry count after the increment.
        retry_count: i32,
        /// New `scheduled_at`.
        next_attempt_at: DateTime<Utc>,
    },
    /// Marked failed.
    Failed,
    /// The row was no longer in `publishing`; nothing was written.
    NotOwned,
}

/// Records publish outcomes and recomputes post rollups.
#[derive(Clone)]
pub struct OutcomeRecorder {
    schedules: PostScheduleRepository,
    posts: PostRepository,
    activity: ActivityService,
    policy: RetryPolicy,
}

impl OutcomeRecorder {
    /// Create a new outcome recorder.
    #[must_use]
    pub const fn new(
        schedules: PostScheduleRepository,
        posts: PostRepository,
        activity: ActivityService,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            schedules,
            posts,
            activity,
            policy,
        }
    }

    /// The retry policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn load_owned(&self, schedule_id: &str) -> AppResult<Option<post_schedule::Model>> {
        let schedule = self.schedules.find_by_id(schedule_id).await?;
        Ok(schedule.filter(|s| s.status == ScheduleStatus::Publishing))
    }

    /// Record a successful publish.
    pub async fn record_success(
        &self,
        schedule_id: &str,
        external_post_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RecordedOutcome> {
        match self.load_owned(schedule_id).await? {
            Some(schedule) => {
                self.record_success_for(&schedule, external_post_id, now)
                    .await
            }
            None => Ok(not_owned(schedule_id)),
        }
    }

    /// Record a successful publish of an already loaded schedule.
    pub async fn record_success_for(
        &self,
        schedule: &post_schedule::Model,
        external_post_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RecordedOutcome> {
        if !self
            .schedules
            .mark_published(
                &schedule.id,
                schedule.claimed_by.as_deref(),
                external_post_id,
                now,
            )
            .await?
        {
            return Ok(not_owned(&schedule.id));
        }

        self.refresh_rollup(&schedule.post_id, now).await?;
        info!(
            schedule_id = %schedule.id,
            post_id = %schedule.post_id,
            external_post_id,
            "Schedule published"
        );
        Ok(RecordedOutcome::Published)
    }

    /// Record a failed publish. Transient failures under the retry ceiling
    /// are requeued; everything else fails permanently.
    pub async fn record_failure(
        &self,
        schedule_id: &str,
        error: &str,
        is_transient: bool,
        now: DateTime<Utc>,
    ) -> AppResult<RecordedOutcome> {
        match self.load_owned(schedule_id).await? {
            Some(schedule) => {
                self.record_failure_for(&schedule, error, is_transient, now)
                    .await
            }
            None => Ok(not_owned(schedule_id)),
        }
    }

    /// Record a failed publish of an already loaded schedule.
    pub async fn record_failure_for(
        &self,
        schedule: &post_schedule::Model,
        error: &str,
        is_transient: bool,
        now: DateTime<Utc>,
    ) -> AppResult<RecordedOutcome> {
        if !self.policy.should_retry(schedule.retry_count, is_transient) {
            return self.fail(schedule, error, now, true).await;
        }

        let delay = self.policy.backoff(schedule.retry_count);
        let next_attempt_at =
            now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        if !self
            .schedules
            .requeue(
                &schedule.id,
                schedule.claimed_by.as_deref(),
                next_attempt_at,
                now,
            )
            .await?
        {
            return Ok(not_owned(&schedule.id));
        }

        let retry_count = schedule.retry_count + 1;
        info!(
            schedule_id = %schedule.id,
            retry_count,
            max_retries = self.policy.max_retries,
            next_attempt_at = %next_attempt_at,
            error,
            "Schedule requeued after transient failure"
        );
        Ok(RecordedOutcome::Requeued {
            retry_count,
            next_attempt_at,
        })
    }

    /// Fail a schedule that was rejected before publishing. The caller
    /// writes its own activity entry.
    pub async fn record_rejection_for(
        &self,
        schedule: &post_schedule::Model,
        reason: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RecordedOutcome> {
        self.fail(schedule, reason, now, false).await
    }

    async fn fail(
        &self,
        schedule: &post_schedule::Model,
        error: &str,
        now: DateTime<Utc>,
        emit_activity: bool,
    ) -> AppResult<RecordedOutcome> {
        if !self
            .schedules
            .mark_failed(&schedule.id, schedule.claimed_by.as_deref(), error, now)
            .await?
        {
            return Ok(not_owned(&schedule.id));
        }

        self.refresh_rollup(&schedule.post_id, now).await?;
        warn!(
            schedule_id = %schedule.id,
            post_id = %schedule.post_id,
            retry_count = schedule.retry_count,
            error,
            "Schedule failed"
        );

        if emit_activity {
            if let Some(post) = self.posts.find_by_id(&schedule.post_id).await? {
                self.activity
                    .record_best_effort(
                        ActivityEntry {
                            workspace_id: post.workspace_id,
                            user_id: None,
                            action: actions::PUBLISH_FAILED,
                            entity_type: "post_schedule",
                            entity_id: schedule.id.clone(),
                            details: json!({
                                "postId": schedule.post_id,
                                "socialAccountId": schedule.social_account_id,
                                "retryCount": schedule.retry_count,
                                "error": error,
                            }),
                        },
                        now,
                    )
                    .await;
            }
        }

        Ok(RecordedOutcome::Failed)
    }

    async fn refresh_rollup(&self, post_id: &str, now: DateTime<Utc>) -> AppResult<PostStatus> {
        let statuses: Vec<ScheduleStatus> = self
            .schedules
            .find_by_post(post_id)
            .await?
            .into_iter()
            .map(|s| s.status)
            .collect();
        let status = rollup_status(&statuses);
        self.posts.update_status(post_id, status, now).await?;
        Ok(status)
    }
}

fn not_owned(schedule_id: &str) -> RecordedOutcome {
    warn!(schedule_id, "Schedule no longer in publishing, outcome not recorded");
    RecordedOutcome::NotOwned
}
