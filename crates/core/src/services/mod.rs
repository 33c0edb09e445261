//! Business logic services.

pub mod activity;
pub mod cleanup;
pub mod dispatcher;
pub mod outcome;
pub mod usage_limiter;
pub mod validator;

pub use activity::{ActivityEntry, ActivityService, actions};
pub use cleanup::{CleanupService, CleanupSummary, eligible_post_ids};
pub use dispatcher::{
    DispatchFailure, DispatchSummary, Dispatcher, DispatcherSettings, ScheduleReport,
    ScheduleResult, provider_for,
};
pub use outcome::{OutcomeRecorder, RecordedOutcome, RetryPolicy, rollup_status};
pub use usage_limiter::{Quota, Role, UsageDecision, UsageLimiter, UsageLimits, UsageStats};
pub use validator::{ValidationReport, validate};
