//! API integration tests.
//!
//! These tests drive the router with a mock database behind the services.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
use serde_json::{Value as Json, json};
use socialcast_api::{AppState, router as api_router};
use socialcast_common::config::{
    CleanupConfig, Config, CronConfig, DatabaseConfig, DispatcherConfig, ProvidersConfig,
    ServerConfig, VaultConfig,
};
use socialcast_common::{CredentialVault, LimitsConfig};
use socialcast_db::entities::post::{self, PostStatus};
use socialcast_db::entities::post_schedule::{self, ScheduleStatus};
use socialcast_db::entities::social_account::{self, AccountStatus, SocialProvider};
use socialcast_publisher::{
    PlatformPublisher, Provider, PublishError, PublishRequest, PublishTarget, PublishedPost,
    PublisherRegistry,
};
use tower::ServiceExt;

const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
const SECRET: &str = "cron-secret";

/// Create a test configuration.
fn create_test_config(secret: Option<&str>) -> Config {
    Config {
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://localhost/test".to_string(),
            max_connections: 10,
            min_connections: 1,
        },
        vault: VaultConfig {
            encryption_key: KEY.to_string(),
        },
        dispatcher: DispatcherConfig::default(),
        cleanup: CleanupConfig::default(),
        providers: ProvidersConfig::default(),
        cron: CronConfig {
            secret: secret.map(ToString::to_string),
        },
        limits: LimitsConfig::default(),
    }
}

/// Create the test router over the given mock database.
fn create_test_router(db: DatabaseConnection, secret: Option<&str>) -> Router {
    build_router(db, secret, PublisherRegistry::new(), Duration::from_secs(30))
}

fn build_router(
    db: DatabaseConnection,
    secret: Option<&str>,
    publishers: PublisherRegistry,
    request_timeout: Duration,
) -> Router {
    let config = create_test_config(secret);
    let state = AppState::new(
        Arc::new(db),
        &config,
        Arc::new(CredentialVault::new(KEY).unwrap()),
        Arc::new(publishers),
    );
    api_router(request_timeout).with_state(state)
}

/// Facebook adapter that takes `delay` to publish.
struct SlowPublisher {
    delay: Duration,
    completed: AtomicUsize,
}

#[async_trait]
impl PlatformPublisher for SlowPublisher {
    fn provider(&self) -> Provider {
        Provider::FacebookPage
    }

    async fn publish(
        &self,
        _target: &PublishTarget,
        _request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError> {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(PublishedPost {
            external_id: "page1_99".to_string(),
        })
    }
}

fn due_schedule(status: ScheduleStatus) -> post_schedule::Model {
    post_schedule::Model {
        id: "s1".to_string(),
        post_id: "post1".to_string(),
        social_account_id: "a1".to_string(),
        scheduled_at: Utc::now().into(),
        status,
        retry_count: 0,
        claimed_by: Some("run1".to_string()),
        published_at: None,
        external_post_id: None,
        error_message: None,
        created_at: Utc::now().into(),
        updated_at: Some(Utc::now().into()),
    }
}

/// Mock database for one pass that publishes a single schedule.
fn single_publish_db() -> DatabaseConnection {
    let vault = CredentialVault::new(KEY).unwrap();
    let scheduled_post = post::Model {
        id: "post1".to_string(),
        workspace_id: "ws1".to_string(),
        user_id: "user1".to_string(),
        title: None,
        content: "Opening day".to_string(),
        media_urls: json!([]),
        providers: json!(["facebook_page"]),
        status: PostStatus::Scheduled,
        scheduled_at: Some(Utc::now().into()),
        created_at: Utc::now().into(),
        updated_at: None,
    };
    let page = social_account::Model {
        id: "a1".to_string(),
        workspace_id: "ws1".to_string(),
        provider: SocialProvider::FacebookPage,
        provider_id: "page1".to_string(),
        name: "Corner Cafe".to_string(),
        status: AccountStatus::Connected,
        token_encrypted: Some(vault.encrypt("page-token").unwrap()),
        expires_at: None,
        metadata: json!({}),
        created_at: Utc::now().into(),
        updated_at: None,
    };
    let exec = || MockExecResult {
        last_insert_id: 0,
        rows_affected: 1,
    };

    MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[due_schedule(ScheduleStatus::Publishing)]])
        .append_query_results([[scheduled_post]])
        .append_query_results([[page]])
        .append_exec_results([exec(), exec()])
        .append_query_results([[due_schedule(ScheduleStatus::Published)]])
        .append_exec_results([exec()])
        .into_connection()
}

fn authorized_publish() -> Request<Body> {
    Request::builder()
        .uri("/api/cron/publish")
        .method("POST")
        .header("Authorization", format!("Bearer {SECRET}"))
        .body(Body::empty())
        .unwrap()
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn counts_row(daily: i64, monthly: i64) -> BTreeMap<&'static str, Value> {
    maplit::btreemap! {
        "daily" => Value::BigInt(Some(daily)),
        "monthly" => Value::BigInt(Some(monthly)),
    }
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Json {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router(empty_db(), None);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_cron_publish_requires_secret() {
    let app = create_test_router(empty_db(), Some(SECRET));

    let response = app
        .oneshot(post_json("/api/cron/publish", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_cron_publish_rejects_wrong_secret() {
    let app = create_test_router(empty_db(), Some(SECRET));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/cron/cleanup")
                .method("POST")
                .header("Authorization", "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_publish_with_nothing_due() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<post_schedule::Model>::new()])
        .into_connection();
    let app = create_test_router(db, Some(SECRET));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/cron/publish?limit=10")
                .method("POST")
                .header("Authorization", format!("Bearer {SECRET}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["processed"], 0);
    assert_eq!(body["successful"], 0);
    assert!(body["details"].as_array().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cron_publish_is_not_bound_by_request_timeout() {
    let publisher = Arc::new(SlowPublisher {
        delay: Duration::from_secs(5),
        completed: AtomicUsize::new(0),
    });
    let app = build_router(
        single_publish_db(),
        Some(SECRET),
        PublisherRegistry::new().with(Arc::clone(&publisher) as Arc<dyn PlatformPublisher>),
        Duration::from_millis(10),
    );

    let response = app.oneshot(authorized_publish()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["successful"], 1);
    assert_eq!(body["details"][0]["externalPostId"], "page1_99");
}

#[tokio::test(start_paused = true)]
async fn test_cron_publish_finishes_after_caller_disconnects() {
    let publisher = Arc::new(SlowPublisher {
        delay: Duration::from_secs(5),
        completed: AtomicUsize::new(0),
    });
    let app = build_router(
        single_publish_db(),
        Some(SECRET),
        PublisherRegistry::new().with(Arc::clone(&publisher) as Arc<dyn PlatformPublisher>),
        Duration::from_secs(30),
    );

    // The caller gives up long before the publish returns
    let gave_up = tokio::time::timeout(Duration::from_millis(100), app.oneshot(authorized_publish()))
        .await;
    assert!(gave_up.is_err());
    assert_eq!(publisher.completed.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(publisher.completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cron_cleanup_without_enabled_workspaces() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<socialcast_db::entities::workspace_settings::Model>::new()])
        .into_connection();
    let app = create_test_router(db, None);

    let response = app
        .oneshot(post_json("/api/cron/cleanup", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["workspacesChecked"], 0);
    assert_eq!(body["postsDeleted"], 0);
}

#[tokio::test]
async fn test_usage_consume_denied_returns_429() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .append_query_results([Vec::<BTreeMap<&str, Value>>::new()])
        .append_query_results([vec![counts_row(5, 12)]])
        .into_connection();
    let app = create_test_router(db, None);

    let response = app
        .oneshot(post_json(
            "/api/usage/consume",
            r#"{"userId":"user1","role":"free","resource":"post_creation"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert_eq!(body["details"]["allowed"], false);
    assert_eq!(body["details"]["usage"]["daily"], 5);
    assert_eq!(body["details"]["usage"]["dailyLimit"], 5);
}

#[tokio::test]
async fn test_usage_stats() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![counts_row(3, 40)]])
        .into_connection();
    let app = create_test_router(db, None);

    let response = app
        .oneshot(post_json(
            "/api/usage/stats",
            r#"{"userId":"user1","role":"professional","resource":"ai_request"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["daily"], 3);
    assert_eq!(body["monthlyLimit"], 2000);
}

#[tokio::test]
async fn test_usage_requires_user_id() {
    let app = create_test_router(empty_db(), None);

    let response = app
        .oneshot(post_json(
            "/api/usage/consume",
            r#"{"userId":"  ","role":"free","resource":"ai_request"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
