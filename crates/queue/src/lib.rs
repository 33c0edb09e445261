//! Background jobs for socialcast.
//!
//! - **Scheduler**: interval loops for the dispatch and cleanup jobs
//! - **Executor**: [`JobExecutor`] backed by the core services

pub mod executor;
pub mod scheduler;

pub use executor::PipelineExecutor;
pub use scheduler::{JobExecutor, ScheduledJob, SchedulerConfig, SchedulerHandle, run_scheduler};
