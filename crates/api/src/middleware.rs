//! Application state and HTTP layers.

use std::sync::Arc;

use axum::http::{Method, header};
use sea_orm::DatabaseConnection;
use socialcast_common::{Config, CredentialVault};
use socialcast_core::{
    ActivityService, CleanupService, Dispatcher, DispatcherSettings, OutcomeRecorder, RetryPolicy,
    UsageLimiter, UsageLimits,
};
use socialcast_db::repositories::{
    ActivityLogRepository, PostRepository, PostScheduleRepository, SocialAccountRepository,
    UsageLogRepository, WorkspaceSettingsRepository,
};
use socialcast_publisher::PublisherRegistry;
use tower_http::cors::CorsLayer;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Publishing passes.
    pub dispatcher: Dispatcher,
    /// Retention cleanup.
    pub cleanup_service: CleanupService,
    /// Usage quotas.
    pub usage_limiter: UsageLimiter,
    /// Bearer token required on cron triggers; `None` leaves them open.
    pub cron_secret: Option<Arc<str>>,
}

impl AppState {
    /// Wire repositories and services over one connection pool.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &Config,
        vault: Arc<CredentialVault>,
        publishers: Arc<PublisherRegistry>,
    ) -> Self {
        let schedule_repo = PostScheduleRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let account_repo = SocialAccountRepository::new(Arc::clone(&db));
        let activity_service = ActivityService::new(ActivityLogRepository::new(Arc::clone(&db)));

        let recorder = OutcomeRecorder::new(
            schedule_repo.clone(),
            post_repo.clone(),
            activity_service.clone(),
            RetryPolicy::from_config(&config.dispatcher.retry),
        );
        let dispatcher = Dispatcher::new(
            schedule_repo.clone(),
            post_repo.clone(),
            account_repo,
            recorder,
            activity_service.clone(),
            vault,
            publishers,
            DispatcherSettings::from_config(&config.dispatcher),
        );
        let cleanup_service = CleanupService::new(
            Arc::clone(&db),
            WorkspaceSettingsRepository::new(Arc::clone(&db)),
            post_repo,
            schedule_repo,
            activity_service,
        );
        let usage_limiter = UsageLimiter::new(
            UsageLogRepository::new(db),
            UsageLimits::new(config.limits.clone()),
        );

        Self {
            dispatcher,
            cleanup_service,
            usage_limiter,
            cron_secret: config
                .cron
                .secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(Arc::from),
        }
    }
}

/// CORS for the JSON endpoints.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
