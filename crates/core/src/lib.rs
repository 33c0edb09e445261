//! Publishing pipeline and account services for socialcast.
//!
//! The [`Dispatcher`] drives a publishing pass end to end. [`OutcomeRecorder`]
//! owns every schedule state transition after a claim, [`CleanupService`]
//! prunes published content per workspace, and [`UsageLimiter`] enforces
//! per-role quotas.

pub mod services;

pub use services::*;
