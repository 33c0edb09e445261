//! socialcast server entry point.

use std::sync::Arc;
use std::time::Duration;

use socialcast_api::{AppState, middleware::cors_layer, router};
use socialcast_common::{Config, CredentialVault};
use socialcast_publisher::PublisherRegistry;
use socialcast_queue::{PipelineExecutor, SchedulerConfig, run_scheduler};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing
    let json_logs = std::env::var("SOCIALCAST_LOG_FORMAT").is_ok_and(|v| v == "json");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "socialcast=debug,tower_http=debug".into());
    if json_logs {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    info!("Starting socialcast server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(socialcast_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    socialcast_db::migrate(&db).await?;

    let vault = Arc::new(CredentialVault::new(&config.vault.encryption_key)?);
    let publishers = Arc::new(PublisherRegistry::from_config(&config.providers)?);

    let state = AppState::new(Arc::clone(&db), &config, vault, publishers);
    if state.cron_secret.is_none() {
        warn!("cron.secret is not set; cron trigger endpoints are unauthenticated");
    }

    // Start periodic jobs
    let executor = Arc::new(PipelineExecutor::new(
        state.dispatcher.clone(),
        state.cleanup_service.clone(),
    ));
    let scheduler = run_scheduler(&SchedulerConfig::from_config(&config), executor);

    let app = router(Duration::from_secs(config.server.request_timeout_secs))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    info!("Server shutdown complete");
    Ok(())
}
