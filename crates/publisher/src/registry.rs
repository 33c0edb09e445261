//! Provider dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use socialcast_common::{AppResult, config::ProvidersConfig};

use crate::error::PublishError;
use crate::facebook::FacebookPublisher;
use crate::instagram::InstagramPublisher;
use crate::types::{Provider, PublishRequest, PublishTarget, PublishedPost};
use crate::zalo::ZaloPublisher;

/// A provider adapter.
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    /// The provider this adapter publishes to.
    fn provider(&self) -> Provider;

    /// Publish one post to one account.
    async fn publish(
        &self,
        target: &PublishTarget,
        request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError>;
}

/// Adapters keyed by provider.
#[derive(Clone, Default)]
pub struct PublisherRegistry {
    publishers: HashMap<Provider, Arc<dyn PlatformPublisher>>,
}

impl PublisherRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter.
    pub fn from_config(config: &ProvidersConfig) -> AppResult<Self> {
        Ok(Self::new()
            .with(Arc::new(FacebookPublisher::new(config)?))
            .with(Arc::new(InstagramPublisher::new(config)?))
            .with(Arc::new(ZaloPublisher::new(config)?)))
    }

    /// Register an adapter, replacing any previous one for its provider.
    #[must_use]
    pub fn with(mut self, publisher: Arc<dyn PlatformPublisher>) -> Self {
        self.publishers.insert(publisher.provider(), publisher);
        self
    }

    /// Adapter for a provider.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<Arc<dyn PlatformPublisher>> {
        self.publishers.get(&provider).cloned()
    }

    /// Publish through the adapter for the target's provider.
    pub async fn publish(
        &self,
        target: &PublishTarget,
        request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError> {
        let publisher = self.publishers.get(&target.provider).ok_or_else(|| {
            PublishError::permanent(format!("no publisher registered for {}", target.provider))
        })?;
        publisher.publish(target, request).await
    }
}

impl std::fmt::Debug for PublisherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherRegistry")
            .field("providers", &self.publishers.keys().collect::<Vec<_>>())
            .finish()
    }
}
