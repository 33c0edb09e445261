//! Instagram Business adapter.
//!
//! Publishing is two-phase: create a media container, then publish it. Video
//! containers are processed asynchronously and must reach `FINISHED` first.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use socialcast_common::{AppResult, config::ProvidersConfig};
use tracing::{debug, warn};

use crate::error::PublishError;
use crate::http::{build_client, require_id, send_json};
use crate::registry::PlatformPublisher;
use crate::types::{MediaItem, MediaKind, Provider, PublishRequest, PublishTarget, PublishedPost};

/// Maximum caption length.
pub const MAX_CAPTION_CHARS: usize = 2_200;

/// Maximum items in a carousel.
pub const MAX_CAROUSEL_ITEMS: usize = 10;

/// Publishes to Instagram Business accounts through the Graph API.
#[derive(Clone)]
pub struct InstagramPublisher {
    client: Client,
    base_url: String,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl InstagramPublisher {
    /// Create a new adapter.
    pub fn new(config: &ProvidersConfig) -> AppResult<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.http_timeout_secs))?,
            base_url: format!(
                "{}/{}",
                config.graph_api_url.trim_end_matches('/'),
                config.graph_api_version
            ),
            poll_attempts: config.instagram_poll_attempts.max(1),
            poll_interval: Duration::from_millis(config.instagram_poll_interval_ms),
        })
    }

    /// Override the versioned Graph base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    async fn create_container(
        &self,
        ig_user: &str,
        token: &str,
        mut body: Value,
    ) -> Result<String, PublishError> {
        body["access_token"] = Value::String(token.to_string());
        let res = send_json(
            self.client
                .post(format!("{}/{ig_user}/media", self.base_url))
                .json(&body),
        )
        .await?;
        require_id(&res, "id")
    }

    fn item_body(item: &MediaItem<'_>, carousel: bool) -> Value {
        let mut body = match item.kind {
            MediaKind::Image => json!({ "image_url": item.url }),
            MediaKind::Video => json!({
                "media_type": if carousel { "VIDEO" } else { "REELS" },
                "video_url": item.url,
            }),
        };
        if carousel {
            body["is_carousel_item"] = Value::Bool(true);
        }
        body
    }

    /// Poll a container until processing finishes.
    ///
    /// `checks_left` is shared by every container of one publish, so a video
    /// carousel waits no longer in total than a single reel.
    async fn wait_until_ready(
        &self,
        container_id: &str,
        token: &str,
        checks_left: &mut u32,
    ) -> Result<(), PublishError> {
        while *checks_left > 0 {
            *checks_left -= 1;
            let res = send_json(
                self.client
                    .get(format!("{}/{container_id}", self.base_url))
                    .query(&[("fields", "status_code"), ("access_token", token)]),
            )
            .await?;

            match res.get("status_code").and_then(Value::as_str) {
                Some("FINISHED" | "PUBLISHED") => return Ok(()),
                Some(status @ ("ERROR" | "EXPIRED")) => {
                    return Err(PublishError::permanent(format!(
                        "media container {container_id} ended in {status}"
                    )));
                }
                status => {
                    debug!(
                        container_id,
                        checks_left = *checks_left,
                        status = ?status,
                        "Media container not ready"
                    );
                }
            }

            if *checks_left > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        warn!(container_id, "Media container still processing, giving up for now");
        Err(PublishError::transient(format!(
            "media container {container_id} was not ready within {} status checks",
            self.poll_attempts
        )))
    }

    async fn publish_container(
        &self,
        ig_user: &str,
        token: &str,
        container_id: &str,
    ) -> Result<String, PublishError> {
        let res = send_json(
            self.client
                .post(format!("{}/{ig_user}/media_publish", self.base_url))
                .json(&json!({ "creation_id": container_id, "access_token": token })),
        )
        .await?;
        require_id(&res, "id")
    }
}

#[async_trait]
impl PlatformPublisher for InstagramPublisher {
    fn provider(&self) -> Provider {
        Provider::Instagram
    }

    async fn publish(
        &self,
        target: &PublishTarget,
        request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError> {
        let media = request.media();
        if media.is_empty() {
            return Err(PublishError::InvalidContent(
                "Instagram posts require at least one image or video".to_string(),
            ));
        }
        if media.len() > MAX_CAROUSEL_ITEMS {
            return Err(PublishError::InvalidContent(format!(
                "Instagram carousels allow at most {MAX_CAROUSEL_ITEMS} items, got {}",
                media.len()
            )));
        }

        let caption = socialcast_format::truncate(
            &socialcast_format::to_unicode(&request.content),
            MAX_CAPTION_CHARS,
        );
        let ig_user = target.provider_id.as_str();
        let token = target.access_token.as_str();
        let has_video = media.iter().any(|m| m.kind == MediaKind::Video);
        let mut checks_left = self.poll_attempts;

        debug!(
            post_id = %request.post_id,
            account_id = %target.account_id,
            media = media.len(),
            "Publishing to Instagram"
        );

        let container_id = if let [item] = media.as_slice() {
            let mut body = Self::item_body(item, false);
            body["caption"] = Value::String(caption);
            self.create_container(ig_user, token, body).await?
        } else {
            let mut children = Vec::with_capacity(media.len());
            for item in &media {
                let child = self
                    .create_container(ig_user, token, Self::item_body(item, true))
                    .await?;
                if item.kind == MediaKind::Video {
                    self.wait_until_ready(&child, token, &mut checks_left)
                        .await?;
                }
                children.push(child);
            }
            self.create_container(
                ig_user,
                token,
                json!({
                    "media_type": "CAROUSEL",
                    "children": children.join(","),
                    "caption": caption,
                }),
            )
            .await?
        };

        if has_video {
            self.wait_until_ready(&container_id, token, &mut checks_left)
                .await?;
        }

        let external_id = self.publish_container(ig_user, token, &container_id).await?;
        Ok(PublishedPost { external_id })
    }
}
