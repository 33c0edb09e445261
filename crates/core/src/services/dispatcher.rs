//! Dispatcher: one pass of the publishing pipeline.
//!
//! Claim due schedules, validate each post once, decrypt credentials, publish
//! concurrently and record every outcome. A failing schedule never aborts its
//! siblings; anything that cannot be recorded stays `publishing` and is picked
//! up again by the stale-claim sweep.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use socialcast_common::config::DispatcherConfig;
use socialcast_common::{AppResult, CredentialVault, IdGenerator};
use socialcast_db::entities::post_schedule;
use socialcast_db::entities::social_account::{self, SocialProvider};
use socialcast_db::repositories::{PostRepository, PostScheduleRepository, SocialAccountRepository};
use socialcast_publisher::{
    PublishError, PublishRequest, PublishTarget, PublishedPost, PublisherRegistry, Provider,
};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::activity::{ActivityEntry, ActivityService, actions};
use super::outcome::{OutcomeRecorder, RecordedOutcome};
use super::validator::validate;

/// Dispatcher tuning.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Schedules claimed per pass when the caller gives no limit.
    pub batch_limit: u64,
    /// Publishes in flight at once.
    pub max_concurrency: usize,
    /// Bound on a single provider call.
    pub publish_timeout: Duration,
    /// Age after which a `publishing` row is claimed again.
    pub stale_after: Option<Duration>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_config(&DispatcherConfig::default())
    }
}

impl DispatcherSettings {
    /// Build from configuration.
    #[must_use]
    pub fn from_config(config: &DispatcherConfig) -> Self {
        Self {
            batch_limit: config.batch_limit,
            max_concurrency: config.max_concurrency.max(1),
            publish_timeout: Duration::from_secs(config.publish_timeout_secs),
            stale_after: config.stale_after_secs.map(Duration::from_secs),
        }
    }
}

/// Why a claimed schedule did not publish.
#[derive(Debug, Clone, Error)]
pub enum DispatchFailure {
    /// The post or its accounts failed pre-publish checks.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The access token is missing or could not be decrypted.
    #[error("Credential error: {0}")]
    Credential(String),

    /// The provider rejected or failed the call.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The provider call outlived `publish_timeout`.
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    /// Reclaimed more often than the retry policy allows.
    #[error("Gave up after {0} interrupted or failed attempts")]
    Exhausted(i32),
}

impl DispatchFailure {
    /// Only provider throttling, outages and timeouts are retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Publish(e) => e.is_transient(),
            Self::Timeout(_) => true,
            Self::Validation(_) | Self::Credential(_) | Self::Exhausted(_) => false,
        }
    }
}

/// How a schedule ended in this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleResult {
    /// Live on the provider.
    Published,
    /// Back to `pending` for another attempt.
    Requeued,
    /// Failed permanently.
    Failed,
    /// Another writer owns the row now.
    NotOwned,
    /// The outcome could not be stored; the row stays `publishing`.
    RecordError,
}

/// Per-schedule line of a [`DispatchSummary`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReport {
    /// Schedule this line is about.
    pub schedule_id: String,
    /// Post the schedule belongs to.
    pub post_id: String,
    /// Target account.
    pub social_account_id: String,
    /// `None` when the account could not be loaded.
    pub provider: Option<Provider>,
    /// How the schedule ended.
    pub result: ScheduleResult,
    /// Provider-side id, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_post_id: Option<String>,
    /// Failure reason, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Retry count after a requeue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<i32>,
    /// When a requeued schedule becomes due again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
}

/// Result of one dispatcher pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    /// Id of this pass; also the claim token on its rows.
    pub run_id: String,
    /// Schedules claimed.
    pub processed: usize,
    /// Schedules published.
    pub successful: usize,
    /// Schedules failed permanently.
    pub failed: usize,
    /// Schedules requeued.
    pub requeued: usize,
    /// One line per claimed schedule.
    pub details: Vec<ScheduleReport>,
}

impl DispatchSummary {
    fn tally(run_id: String, processed: usize, details: Vec<ScheduleReport>) -> Self {
        let count = |r: ScheduleResult| details.iter().filter(|d| d.result == r).count();
        Self {
            run_id,
            processed,
            successful: count(ScheduleResult::Published),
            failed: count(ScheduleResult::Failed),
            requeued: count(ScheduleResult::Requeued),
            details,
        }
    }
}

/// Provider adapter tag for a stored account provider.
#[must_use]
pub const fn provider_for(provider: SocialProvider) -> Provider {
    match provider {
        SocialProvider::FacebookPage => Provider::FacebookPage,
        SocialProvider::Instagram => Provider::Instagram,
        SocialProvider::Zalo => Provider::Zalo,
    }
}

/// Per-account locks for one pass. Publishes to the same account run one
/// at a time; different accounts proceed in parallel.
#[derive(Default)]
struct AccountLocks {
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl AccountLocks {
    fn get(&mut self, account_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(account_id.to_string()).or_default())
    }
}

struct PublishJob {
    schedule: post_schedule::Model,
    target: PublishTarget,
    request: Arc<PublishRequest>,
}

/// Runs publishing passes.
#[derive(Clone)]
pub struct Dispatcher {
    schedules: PostScheduleRepository,
    posts: PostRepository,
    accounts: SocialAccountRepository,
    recorder: OutcomeRecorder,
    activity: ActivityService,
    vault: Arc<CredentialVault>,
    publishers: Arc<PublisherRegistry>,
    settings: DispatcherSettings,
    id_gen: IdGenerator,
}

impl Dispatcher {
    /// Create a new dispatcher.
    #[must_use]
    pub const fn new(
        schedules: PostScheduleRepository,
        posts: PostRepository,
        accounts: SocialAccountRepository,
        recorder: OutcomeRecorder,
        activity: ActivityService,
        vault: Arc<CredentialVault>,
        publishers: Arc<PublisherRegistry>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            schedules,
            posts,
            accounts,
            recorder,
            activity,
            vault,
            publishers,
            settings,
            id_gen: IdGenerator::new(),
        }
    }

    /// Run one pass over at most `limit` due schedules (the configured batch
    /// limit when `None`).
    pub async fn run_once(&self, limit: Option<u64>) -> AppResult<DispatchSummary> {
        let run_id = self.id_gen.generate_run_id();
        let now = Utc::now();
        let limit = limit.unwrap_or(self.settings.batch_limit);
        let stale_before = self
            .settings
            .stale_after
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| now - d);

        let claimed = self
            .schedules
            .claim_due(&run_id, limit, now, stale_before)
            .await?;
        if claimed.is_empty() {
            debug!(run_id = %run_id, "No due schedules");
            return Ok(DispatchSummary::tally(run_id, 0, vec![]));
        }
        let processed = claimed.len();
        info!(run_id = %run_id, claimed = processed, "Claimed due schedules");

        let mut reports = Vec::with_capacity(processed);
        let max_retries = self.recorder.policy().max_retries;
        let mut by_post: BTreeMap<String, Vec<post_schedule::Model>> = BTreeMap::new();
        for schedule in claimed {
            // Only a stale reclaim pushes retry_count past the ceiling
            if schedule.retry_count > max_retries {
                let failure = DispatchFailure::Exhausted(schedule.retry_count);
                reports.push(self.reject(&schedule, None, &failure, now).await);
                continue;
            }
            by_post
                .entry(schedule.post_id.clone())
                .or_default()
                .push(schedule);
        }

        let post_ids: Vec<String> = by_post.keys().cloned().collect();
        let posts: HashMap<String, _> = self
            .posts
            .find_by_ids(&post_ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut account_ids: Vec<String> = by_post
            .values()
            .flatten()
            .map(|s| s.social_account_id.clone())
            .collect();
        account_ids.sort();
        account_ids.dedup();
        let accounts: HashMap<String, social_account::Model> = self
            .accounts
            .find_by_ids(&account_ids)
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        let mut jobs = Vec::new();

        for (post_id, schedules) in by_post {
            let Some(post) = posts.get(&post_id) else {
                let failure = DispatchFailure::Validation(format!("Post {post_id} not found"));
                for schedule in &schedules {
                    reports.push(self.reject(schedule, None, &failure, now).await);
                }
                continue;
            };

            let report = validate(post, &schedules, &accounts, now);
            for warning in &report.warnings {
                warn!(post_id = %post_id, warning = %warning, "Validation warning");
            }

            if !report.is_ok() {
                warn!(post_id = %post_id, errors = %report.summary(), "Post failed validation");
                self.activity
                    .record_best_effort(
                        ActivityEntry {
                            workspace_id: post.workspace_id.clone(),
                            user_id: Some(post.user_id.clone()),
                            action: actions::VALIDATION_FAILED,
                            entity_type: "post",
                            entity_id: post_id.clone(),
                            details: json!({
                                "errors": report.errors,
                                "warnings": report.warnings,
                                "scheduleIds": schedules.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
                            }),
                        },
                        now,
                    )
                    .await;

                let failure = DispatchFailure::Validation(report.summary());
                for schedule in &schedules {
                    let provider = accounts
                        .get(&schedule.social_account_id)
                        .map(|a| provider_for(a.provider));
                    reports.push(self.reject(schedule, provider, &failure, now).await);
                }
                continue;
            }

            let request = Arc::new(PublishRequest {
                post_id: post.id.clone(),
                title: post.title.clone(),
                content: post.content.clone(),
                media_urls: post.media_url_list(),
            });

            for schedule in schedules {
                let Some(account) = accounts.get(&schedule.social_account_id) else {
                    let failure = DispatchFailure::Validation(format!(
                        "Social account {} not found",
                        schedule.social_account_id
                    ));
                    reports.push(self.reject(&schedule, None, &failure, now).await);
                    continue;
                };

                match self.prepare_target(account) {
                    Ok(target) => jobs.push(PublishJob {
                        schedule,
                        target,
                        request: Arc::clone(&request),
                    }),
                    Err(failure) => {
                        let provider = Some(provider_for(account.provider));
                        reports.push(self.record(&schedule, provider, Err(failure), now).await);
                    }
                }
            }
        }

        reports.extend(self.publish_all(jobs).await);

        let summary = DispatchSummary::tally(run_id, processed, reports);
        info!(
            run_id = %summary.run_id,
            processed = summary.processed,
            successful = summary.successful,
            failed = summary.failed,
            requeued = summary.requeued,
            "Dispatch pass finished"
        );
        Ok(summary)
    }

    fn prepare_target(
        &self,
        account: &social_account::Model,
    ) -> Result<PublishTarget, DispatchFailure> {
        let sealed = account
            .token_encrypted
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DispatchFailure::Credential("no access token".to_string()))?;
        let access_token = self
            .vault
            .decrypt(sealed)
            .map_err(|e| DispatchFailure::Credential(e.to_string()))?;

        Ok(PublishTarget {
            provider: provider_for(account.provider),
            account_id: account.id.clone(),
            provider_id: account.provider_id.clone(),
            name: account.name.clone(),
            access_token,
            metadata: account.metadata.clone(),
        })
    }

    async fn publish_all(&self, jobs: Vec<PublishJob>) -> Vec<ScheduleReport> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency));
        let mut locks = AccountLocks::default();
        let mut join_set = JoinSet::new();

        for job in jobs {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let account_lock = locks.get(&job.target.account_id);
            let span = info_span!(
                "publish",
                schedule_id = %job.schedule.id,
                account_id = %job.target.account_id,
                provider = %job.target.provider,
            );

            join_set.spawn(
                async move {
                    let _guard = account_lock.lock().await;
                    let _permit = semaphore.acquire_owned().await;
                    match this.renew(&job).await {
                        Some(report) => report,
                        None => this.execute(job).await,
                    }
                }
                .instrument(span),
            );
        }

        let mut reports = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Publish task aborted"),
            }
        }
        reports
    }

    /// Refresh the claim right before publishing. A job that waited out the
    /// stale window behind its account lock may have been reclaimed by another
    /// pass; it then stops here and never reaches the provider.
    async fn renew(&self, job: &PublishJob) -> Option<ScheduleReport> {
        let schedule = &job.schedule;
        let provider = Some(job.target.provider);
        let renewed = self
            .schedules
            .renew_claim(&schedule.id, schedule.claimed_by.as_deref(), Utc::now())
            .await;
        match renewed {
            Ok(true) => None,
            Ok(false) => {
                warn!(schedule_id = %schedule.id, "Claim lost before publishing, skipping");
                Some(schedule_report(
                    schedule,
                    provider,
                    Ok(RecordedOutcome::NotOwned),
                    None,
                    None,
                ))
            }
            Err(e) => Some(schedule_report(
                schedule,
                provider,
                Err(e),
                None,
                Some("claim not renewed, publish skipped".to_string()),
            )),
        }
    }

    async fn execute(&self, job: PublishJob) -> ScheduleReport {
        let provider = job.target.provider;
        let result = match tokio::time::timeout(
            self.settings.publish_timeout,
            self.publishers.publish(&job.target, &job.request),
        )
        .await
        {
            Ok(Ok(published)) => Ok(published),
            Ok(Err(e)) => Err(DispatchFailure::Publish(e)),
            Err(_) => Err(DispatchFailure::Timeout(self.settings.publish_timeout)),
        };

        self.record(&job.schedule, Some(provider), result, Utc::now())
            .await
    }

    async fn reject(
        &self,
        schedule: &post_schedule::Model,
        provider: Option<Provider>,
        failure: &DispatchFailure,
        now: DateTime<Utc>,
    ) -> ScheduleReport {
        let error = failure.to_string();
        let recorded = self
            .recorder
            .record_rejection_for(schedule, &error, now)
            .await;
        schedule_report(schedule, provider, recorded, None, Some(error))
    }

    async fn record(
        &self,
        schedule: &post_schedule::Model,
        provider: Option<Provider>,
        result: Result<PublishedPost, DispatchFailure>,
        now: DateTime<Utc>,
    ) -> ScheduleReport {
        match result {
            Ok(published) => {
                let recorded = self
                    .recorder
                    .record_success_for(schedule, &published.external_id, now)
                    .await;
                schedule_report(
                    schedule,
                    provider,
                    recorded,
                    Some(published.external_id),
                    None,
                )
            }
            Err(failure) => {
                let error = failure.to_string();
                let recorded = self
                    .recorder
                    .record_failure_for(schedule, &error, failure.is_transient(), now)
                    .await;
                schedule_report(schedule, provider, recorded, None, Some(error))
            }
        }
    }
}

fn schedule_report(
    schedule: &post_schedule::Model,
    provider: Option<Provider>,
    recorded: AppResult<RecordedOutcome>,
    external_post_id: Option<String>,
    error: Option<String>,
) -> ScheduleReport {
    let mut report = ScheduleReport {
        schedule_id: schedule.id.clone(),
        post_id: schedule.post_id.clone(),
        social_account_id: schedule.social_account_id.clone(),
        provider,
        result: ScheduleResult::RecordError,
        external_post_id: None,
        error,
        retry_count: None,
        next_attempt_at: None,
    };

    match recorded {
        Ok(RecordedOutcome::Published) => {
            report.result = ScheduleResult::Published;
            report.external_post_id = external_post_id;
        }
        Ok(RecordedOutcome::Requeued {
            retry_count,
            next_attempt_at,
        }) => {
            report.result = ScheduleResult::Requeued;
            report.retry_count = Some(retry_count);
            report.next_attempt_at = Some(next_attempt_at);
        }
        Ok(RecordedOutcome::Failed) => report.result = ScheduleResult::Failed,
        Ok(RecordedOutcome::NotOwned) => report.result = ScheduleResult::NotOwned,
        Err(e) => {
            error!(schedule_id = %schedule.id, error = %e, "Failed to record publish outcome");
            report.error = Some(match report.error.take() {
                Some(original) => format!("{original}; outcome not recorded: {e}"),
                None => format!("outcome not recorded: {e}"),
            });
        }
    }
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::outcome::RetryPolicy;
    use crate::services::validator::tests::{account, post, schedule};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use socialcast_db::entities::activity_log;
    use socialcast_db::entities::post::PostStatus;
    use socialcast_db::entities::post_schedule::ScheduleStatus;
    use socialcast_db::entities::social_account::AccountStatus;
    use socialcast_db::repositories::ActivityLogRepository;
    use socialcast_common::config::ProvidersConfig;
    use socialcast_publisher::PlatformPublisher;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    /// Scripted adapter for the Facebook provider.
    struct FakePublisher {
        result: Result<String, PublishError>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakePublisher {
        fn new(result: Result<String, PublishError>) -> Arc<Self> {
            Self::slow(result, Duration::ZERO)
        }

        fn slow(result: Result<String, PublishError>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                result,
                delay,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PlatformPublisher for FakePublisher {
        fn provider(&self) -> Provider {
            Provider::FacebookPage
        }

        async fn publish(
            &self,
            _target: &PublishTarget,
            _request: &PublishRequest,
        ) -> Result<PublishedPost, PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.result.clone().map(|external_id| PublishedPost { external_id })
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn activity_row(action: &str) -> activity_log::Model {
        activity_log::Model {
            id: "act1".to_string(),
            workspace_id: "ws1".to_string(),
            user_id: None,
            action: action.to_string(),
            entity_type: "post_schedule".to_string(),
            entity_id: "s1".to_string(),
            details: json!({}),
            created_at: Utc::now().into(),
        }
    }

    fn connected_account(vault: &CredentialVault) -> social_account::Model {
        account(
            "a1",
            SocialProvider::FacebookPage,
            AccountStatus::Connected,
            Some(&vault.encrypt("page-token").unwrap()),
        )
    }

    fn claimed(id: &str, retry_count: i32) -> post_schedule::Model {
        let mut s = schedule(id, "a1", ScheduleStatus::Publishing);
        s.retry_count = retry_count;
        s.claimed_by = Some("run1".to_string());
        s
    }

    fn with_status(mut s: post_schedule::Model, status: ScheduleStatus) -> post_schedule::Model {
        s.status = status;
        s
    }

    fn dispatcher(
        db: DatabaseConnection,
        publisher: Arc<FakePublisher>,
        settings: DispatcherSettings,
    ) -> Dispatcher {
        dispatcher_with(db, PublisherRegistry::new().with(publisher), settings)
    }

    fn dispatcher_with(
        db: DatabaseConnection,
        publishers: PublisherRegistry,
        settings: DispatcherSettings,
    ) -> Dispatcher {
        let db = Arc::new(db);
        let schedules = PostScheduleRepository::new(Arc::clone(&db));
        let posts = PostRepository::new(Arc::clone(&db));
        let activity = ActivityService::new(ActivityLogRepository::new(Arc::clone(&db)));
        let recorder = OutcomeRecorder::new(
            schedules.clone(),
            posts.clone(),
            activity.clone(),
            RetryPolicy::default(),
        );
        Dispatcher::new(
            schedules,
            posts,
            SocialAccountRepository::new(db),
            recorder,
            activity,
            Arc::new(CredentialVault::new(KEY).unwrap()),
            Arc::new(publishers),
            settings,
        )
    }

    #[tokio::test]
    async fn test_nothing_due() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post_schedule::Model>::new()])
            .into_connection();
        let publisher = FakePublisher::new(Ok("x".to_string()));

        let summary = dispatcher(db, publisher, DispatcherSettings::default())
            .run_once(None)
            .await
            .unwrap();
        assert_eq!(summary.processed, 0);
        assert!(summary.details.is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_account_fails_without_publishing() {
        let vault = CredentialVault::new(KEY).unwrap();
        let mut disconnected = connected_account(&vault);
        disconnected.status = AccountStatus::Disconnected;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 0)]])
            .append_query_results([[post(PostStatus::Scheduled)]])
            .append_query_results([[disconnected]])
            .append_query_results([[activity_row(actions::VALIDATION_FAILED)]])
            .append_exec_results([exec(1)])
            .append_query_results([[with_status(claimed("s1", 0), ScheduleStatus::Failed)]])
            .append_exec_results([exec(1)])
            .into_connection();
        let publisher = FakePublisher::new(Ok("x".to_string()));

        let summary = dispatcher(db, Arc::clone(&publisher), DispatcherSettings::default())
            .run_once(None)
            .await
            .unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.details[0].result, ScheduleResult::Failed);
        assert!(summary.details[0].error.as_deref().unwrap().contains("disconnected"));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disconnected_account_blocks_every_schedule_of_the_post() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "unexpected"})))
            .expect(0)
            .mount(&server)
            .await;
        let providers = ProvidersConfig {
            graph_api_url: server.uri(),
            zalo_api_url: server.uri(),
            ..ProvidersConfig::default()
        };

        let vault = CredentialVault::new(KEY).unwrap();
        let instagram = account(
            "a2",
            SocialProvider::Instagram,
            AccountStatus::Disconnected,
            Some(&vault.encrypt("ig-token").unwrap()),
        );
        let mut both = post(PostStatus::Scheduled);
        both.providers = json!(["facebook_page", "instagram"]);
        let to_facebook = claimed("s1", 0);
        let mut to_instagram = claimed("s2", 0);
        to_instagram.social_account_id = "a2".to_string();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[to_facebook.clone(), to_instagram.clone()]])
            .append_query_results([[both]])
            .append_query_results([[connected_account(&vault), instagram]])
            .append_query_results([[activity_row(actions::VALIDATION_FAILED)]])
            .append_query_results([[
                with_status(to_facebook.clone(), ScheduleStatus::Failed),
                to_instagram.clone(),
            ]])
            .append_query_results([[
                with_status(to_facebook, ScheduleStatus::Failed),
                with_status(to_instagram, ScheduleStatus::Failed),
            ]])
            .append_exec_results([exec(1), exec(1), exec(1), exec(1)])
            .into_connection();

        let summary = dispatcher_with(
            db,
            PublisherRegistry::from_config(&providers).unwrap(),
            DispatcherSettings::default(),
        )
        .run_once(None)
        .await
        .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 2);
        for detail in &summary.details {
            let error = detail.error.as_deref().unwrap();
            assert!(error.contains("'Shop a2' (instagram) is disconnected"), "{error}");
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_publish() {
        let vault = CredentialVault::new(KEY).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 0)]])
            .append_query_results([[post(PostStatus::Scheduled)]])
            .append_query_results([[connected_account(&vault)]])
            .append_exec_results([exec(1), exec(1)])
            .append_query_results([[with_status(claimed("s1", 0), ScheduleStatus::Published)]])
            .append_exec_results([exec(1)])
            .into_connection();
        let publisher = FakePublisher::new(Ok("page1_42".to_string()));

        let summary = dispatcher(db, Arc::clone(&publisher), DispatcherSettings::default())
            .run_once(Some(10))
            .await
            .unwrap();

        assert_eq!(summary.successful, 1);
        assert_eq!(summary.details[0].external_post_id.as_deref(), Some("page1_42"));
        assert_eq!(summary.details[0].provider, Some(Provider::FacebookPage));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_is_requeued() {
        let vault = CredentialVault::new(KEY).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 1)]])
            .append_query_results([[post(PostStatus::Scheduled)]])
            .append_query_results([[connected_account(&vault)]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let publisher = FakePublisher::new(Err(PublishError::Transient {
            status: Some(429),
            message: "Too many calls".to_string(),
        }));

        let summary = dispatcher(db, publisher, DispatcherSettings::default())
            .run_once(None)
            .await
            .unwrap();

        assert_eq!(summary.requeued, 1);
        assert_eq!(summary.details[0].retry_count, Some(2));
    }

    #[tokio::test]
    async fn test_rate_limited_at_ceiling_fails() {
        let vault = CredentialVault::new(KEY).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 3)]])
            .append_query_results([[post(PostStatus::Scheduled)]])
            .append_query_results([[connected_account(&vault)]])
            .append_exec_results([exec(1), exec(1)])
            .append_query_results([[with_status(claimed("s1", 3), ScheduleStatus::Failed)]])
            .append_exec_results([exec(1)])
            .append_query_results([[post(PostStatus::Failed)]])
            .append_query_results([[activity_row(actions::PUBLISH_FAILED)]])
            .into_connection();
        let publisher = FakePublisher::new(Err(PublishError::Transient {
            status: Some(429),
            message: "Too many calls".to_string(),
        }));

        let summary = dispatcher(db, publisher, DispatcherSettings::default())
            .run_once(None)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.details[0].error.as_deref(), Some("Too many calls"));
    }

    #[tokio::test]
    async fn test_tampered_token_is_permanent_credential_failure() {
        let vault = CredentialVault::new(KEY).unwrap();
        let mut tampered = connected_account(&vault);
        let sealed = tampered.token_encrypted.take().unwrap();
        let (head, last) = sealed.split_at(sealed.len() - 1);
        let flipped = if last == "0" { "1" } else { "0" };
        tampered.token_encrypted = Some(format!("{head}{flipped}"));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 0)]])
            .append_query_results([[post(PostStatus::Scheduled)]])
            .append_query_results([[tampered]])
            .append_exec_results([exec(1)])
            .append_query_results([[with_status(claimed("s1", 0), ScheduleStatus::Failed)]])
            .append_exec_results([exec(1)])
            .append_query_results([[post(PostStatus::Failed)]])
            .append_query_results([[activity_row(actions::PUBLISH_FAILED)]])
            .into_connection();
        let publisher = FakePublisher::new(Ok("x".to_string()));

        let summary = dispatcher(db, Arc::clone(&publisher), DispatcherSettings::default())
            .run_once(None)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert!(summary.details[0].error.as_deref().unwrap().starts_with("Credential error"));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lost_claim_skips_publish() {
        let vault = CredentialVault::new(KEY).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 0)]])
            .append_query_results([[post(PostStatus::Scheduled)]])
            .append_query_results([[connected_account(&vault)]])
            .append_exec_results([exec(0)])
            .into_connection();
        let publisher = FakePublisher::new(Ok("x".to_string()));

        let summary = dispatcher(db, Arc::clone(&publisher), DispatcherSettings::default())
            .run_once(None)
            .await
            .unwrap();

        assert_eq!(summary.details[0].result, ScheduleResult::NotOwned);
        assert_eq!(summary.successful + summary.failed + summary.requeued, 0);
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reclaimed_past_ceiling_is_failed_without_publishing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 4)]])
            .append_exec_results([exec(1)])
            .append_query_results([[with_status(claimed("s1", 4), ScheduleStatus::Failed)]])
            .append_exec_results([exec(1)])
            .into_connection();
        let publisher = FakePublisher::new(Ok("x".to_string()));

        let summary = dispatcher(db, Arc::clone(&publisher), DispatcherSettings::default())
            .run_once(None)
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert!(summary.details[0].error.as_deref().unwrap().starts_with("Gave up after 4"));
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let vault = CredentialVault::new(KEY).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 0)]])
            .append_query_results([[post(PostStatus::Scheduled)]])
            .append_query_results([[connected_account(&vault)]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let publisher = FakePublisher::slow(Ok("late".to_string()), Duration::from_secs(60));
        let settings = DispatcherSettings {
            publish_timeout: Duration::from_secs(5),
            ..DispatcherSettings::default()
        };

        let summary = dispatcher(db, publisher, settings)
            .run_once(None)
            .await
            .unwrap();

        assert_eq!(summary.requeued, 1);
        assert!(summary.details[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_account_publishes_are_serialized() {
        let vault = CredentialVault::new(KEY).unwrap();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[claimed("s1", 0), claimed("s2", 0)]])
            .append_query_results([[post(PostStatus::Scheduled)]])
            .append_query_results([[connected_account(&vault)]])
            .append_exec_results([exec(1), exec(1)])
            .append_query_results([[with_status(claimed("s1", 0), ScheduleStatus::Published)]])
            .append_exec_results([exec(1)])
            .append_exec_results([exec(1), exec(1)])
            .append_query_results([[with_status(claimed("s2", 0), ScheduleStatus::Published)]])
            .append_exec_results([exec(1)])
            .into_connection();
        let publisher = FakePublisher::slow(Ok("ok".to_string()), Duration::from_millis(100));

        let summary = dispatcher(db, Arc::clone(&publisher), DispatcherSettings::default())
            .run_once(None)
            .await
            .unwrap();

        assert_eq!(summary.successful, 2);
        assert_eq!(publisher.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
