//! HTTP API layer for socialcast.
//!
//! - **Cron triggers**: dispatcher and cleanup passes behind a shared secret
//! - **Usage**: quota consumption and stats for collaborators
//! - **Health**: liveness check
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;

pub use endpoints::router;
pub use middleware::AppState;
