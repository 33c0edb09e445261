//! Provider adapters for socialcast.
//!
//! Each supported platform implements [`PlatformPublisher`]; the
//! [`PublisherRegistry`] picks the adapter by [`Provider`]. Content arrives in
//! the markdown dialect and is rendered per provider with `socialcast-format`.
//!
//! Failures are classified once, here: [`PublishError::is_transient`] tells
//! the caller whether a retry may help.

pub mod error;
pub mod facebook;
pub mod http;
pub mod instagram;
pub mod registry;
pub mod types;
pub mod zalo;

pub use error::{PublishError, PublishResult};
pub use facebook::FacebookPublisher;
pub use instagram::InstagramPublisher;
pub use registry::{PlatformPublisher, PublisherRegistry};
pub use types::{MediaItem, MediaKind, Provider, PublishRequest, PublishTarget, PublishedPost};
pub use zalo::ZaloPublisher;
