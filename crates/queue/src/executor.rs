//! Job executor backed by the core services.

use chrono::Utc;
use socialcast_common::AppResult;
use socialcast_core::{CleanupService, CleanupSummary, DispatchSummary, Dispatcher};

use crate::scheduler::JobExecutor;

/// Runs scheduled jobs against the dispatcher and cleanup service.
#[derive(Clone)]
pub struct PipelineExecutor {
    dispatcher: Dispatcher,
    cleanup: CleanupService,
}

impl PipelineExecutor {
    /// Create a new executor.
    #[must_use]
    pub const fn new(dispatcher: Dispatcher, cleanup: CleanupService) -> Self {
        Self {
            dispatcher,
            cleanup,
        }
    }
}

#[async_trait::async_trait]
impl JobExecutor for PipelineExecutor {
    async fn dispatch_due(&self) -> AppResult<DispatchSummary> {
        self.dispatcher.run_once(None).await
    }

    async fn cleanup_workspaces(&self) -> AppResult<CleanupSummary> {
        self.cleanup.run(Utc::now()).await
    }
}
