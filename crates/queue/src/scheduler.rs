//! Interval scheduler for the periodic pipeline jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use socialcast_common::{AppResult, Config};
use socialcast_core::{CleanupSummary, DispatchSummary};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Scheduled job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledJob {
    /// Claim and publish due schedules.
    DispatchDueSchedules,
    /// Prune old published posts of auto-delete workspaces.
    CleanupWorkspaces,
}

impl ScheduledJob {
    /// Name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DispatchDueSchedules => "dispatch_due_schedules",
            Self::CleanupWorkspaces => "cleanup_workspaces",
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Whether the dispatch job runs in-process.
    pub dispatch_enabled: bool,
    /// Interval between dispatch passes (default: 60 seconds).
    pub dispatch_interval: Duration,
    /// Whether the cleanup job runs in-process.
    pub cleanup_enabled: bool,
    /// Interval between cleanup passes (default: 24 hours).
    pub cleanup_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_enabled: true,
            dispatch_interval: Duration::from_secs(60),
            cleanup_enabled: true,
            cleanup_interval: Duration::from_secs(86400),
        }
    }
}

impl SchedulerConfig {
    /// Build from application configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            dispatch_enabled: config.dispatcher.enabled,
            dispatch_interval: Duration::from_secs(config.dispatcher.interval_secs.max(1)),
            cleanup_enabled: config.cleanup.enabled,
            cleanup_interval: Duration::from_secs(config.cleanup.interval_secs.max(1)),
        }
    }
}

/// Job executor trait for scheduled jobs.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run one dispatcher pass with the configured batch limit.
    async fn dispatch_due(&self) -> AppResult<DispatchSummary>;

    /// Run workspace cleanup.
    async fn cleanup_workspaces(&self) -> AppResult<CleanupSummary>;
}

/// Handles of the spawned job loops.
#[derive(Debug, Default)]
pub struct SchedulerHandle {
    handles: Vec<(ScheduledJob, JoinHandle<()>)>,
}

impl SchedulerHandle {
    /// Jobs that were started.
    #[must_use]
    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.handles.iter().map(|(job, _)| *job).collect()
    }

    /// Stop all job loops. A pass in progress is dropped at its next
    /// suspension point; its claimed rows are reclaimed once stale.
    pub fn shutdown(self) {
        for (job, handle) in self.handles {
            handle.abort();
            tracing::debug!(job = job.name(), "Scheduled job stopped");
        }
    }
}

/// Run the scheduler with the given configuration and executor.
///
/// Each job runs in its own task; a pass that overruns its interval delays
/// the next tick instead of stacking passes.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: &SchedulerConfig,
    executor: Arc<E>,
) -> SchedulerHandle {
    let mut handles = Vec::new();

    if config.dispatch_enabled {
        let executor_dispatch = Arc::clone(&executor);
        let dispatch_interval = config.dispatch_interval;

        // Spawn dispatch task
        handles.push((
            ScheduledJob::DispatchDueSchedules,
            tokio::spawn(async move {
                let mut interval = interval(dispatch_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    match executor_dispatch.dispatch_due().await {
                        Ok(summary) => {
                            if summary.processed > 0 {
                                tracing::info!(
                                    run_id = %summary.run_id,
                                    processed = summary.processed,
                                    successful = summary.successful,
                                    failed = summary.failed,
                                    requeued = summary.requeued,
                                    "Processed due schedules"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to dispatch due schedules");
                        }
                    }
                }
            }),
        ));
    }

    if config.cleanup_enabled {
        let executor_cleanup = executor;
        let cleanup_interval = config.cleanup_interval;

        // Spawn cleanup task
        handles.push((
            ScheduledJob::CleanupWorkspaces,
            tokio::spawn(async move {
                let mut interval = interval(cleanup_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    match executor_cleanup.cleanup_workspaces().await {
                        Ok(summary) => {
                            if summary.posts_deleted > 0 {
                                tracing::info!(
                                    workspaces = summary.workspaces_cleaned,
                                    posts = summary.posts_deleted,
                                    "Cleaned up published posts"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to cleanup workspaces");
                        }
                    }
                }
            }),
        ));
    }

    tracing::info!(
        jobs = handles.len(),
        at = %Utc::now(),
        "Scheduler started"
    );
    SchedulerHandle { handles }
}
