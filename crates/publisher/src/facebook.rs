//! Facebook Page adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use socialcast_common::{AppResult, config::ProvidersConfig};
use tracing::debug;

use crate::error::PublishError;
use crate::http::{build_client, id_field, require_id, send_json};
use crate::registry::PlatformPublisher;
use crate::types::{MediaKind, Provider, PublishRequest, PublishTarget, PublishedPost};

/// Maximum length of a Page post message.
pub const MAX_MESSAGE_CHARS: usize = 63_206;

/// Publishes to Facebook Pages through the Graph API.
#[derive(Clone)]
pub struct FacebookPublisher {
    client: Client,
    base_url: String,
}

impl FacebookPublisher {
    /// Create a new adapter.
    pub fn new(config: &ProvidersConfig) -> AppResult<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.http_timeout_secs))?,
            base_url: format!(
                "{}/{}",
                config.graph_api_url.trim_end_matches('/'),
                config.graph_api_version
            ),
        })
    }

    /// Override the versioned Graph base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    async fn post(&self, path: &str, token: &str, mut body: Value) -> Result<Value, PublishError> {
        body["access_token"] = Value::String(token.to_string());
        send_json(
            self.client
                .post(format!("{}/{path}", self.base_url))
                .json(&body),
        )
        .await
    }

    async fn publish_text(&self, page: &str, token: &str, message: &str) -> Result<String, PublishError> {
        let res = self
            .post(&format!("{page}/feed"), token, json!({ "message": message }))
            .await?;
        require_id(&res, "id")
    }

    async fn publish_photo(
        &self,
        page: &str,
        token: &str,
        url: &str,
        message: &str,
    ) -> Result<String, PublishError> {
        let res = self
            .post(
                &format!("{page}/photos"),
                token,
                json!({ "url": url, "caption": message }),
            )
            .await?;
        // The feed story id is the post; the bare id is the photo object
        id_field(&res, "post_id").map_or_else(|| require_id(&res, "id"), Ok)
    }

    async fn publish_album(
        &self,
        page: &str,
        token: &str,
        urls: &[&str],
        message: &str,
    ) -> Result<String, PublishError> {
        let mut attached = Vec::with_capacity(urls.len());
        for url in urls {
            let res = self
                .post(
                    &format!("{page}/photos"),
                    token,
                    json!({ "url": url, "published": false }),
                )
                .await?;
            attached.push(json!({ "media_fbid": require_id(&res, "id")? }));
        }

        let res = self
            .post(
                &format!("{page}/feed"),
                token,
                json!({ "message": message, "attached_media": attached }),
            )
            .await?;
        require_id(&res, "id")
    }

    async fn publish_video(
        &self,
        page: &str,
        token: &str,
        url: &str,
        message: &str,
    ) -> Result<String, PublishError> {
        let res = self
            .post(
                &format!("{page}/videos"),
                token,
                json!({ "file_url": url, "description": message }),
            )
            .await?;
        require_id(&res, "id")
    }
}

#[async_trait]
impl PlatformPublisher for FacebookPublisher {
    fn provider(&self) -> Provider {
        Provider::FacebookPage
    }

    async fn publish(
        &self,
        target: &PublishTarget,
        request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError> {
        let message = socialcast_format::truncate(
            &socialcast_format::to_unicode(&request.content),
            MAX_MESSAGE_CHARS,
        );
        let media = request.media();
        let page = target.provider_id.as_str();
        let token = target.access_token.as_str();

        debug!(
            post_id = %request.post_id,
            account_id = %target.account_id,
            media = media.len(),
            "Publishing to Facebook Page"
        );

        let external_id = match media.as_slice() {
            [] => self.publish_text(page, token, &message).await?,
            [item] if item.kind == MediaKind::Video => {
                self.publish_video(page, token, item.url, &message).await?
            }
            [item] => self.publish_photo(page, token, item.url, &message).await?,
            items if items.iter().any(|m| m.kind == MediaKind::Video) => {
                return Err(PublishError::InvalidContent(
                    "Facebook posts cannot combine a video with other media".to_string(),
                ));
            }
            items => {
                let urls: Vec<&str> = items.iter().map(|m| m.url).collect();
                self.publish_album(page, token, &urls, &message).await?
            }
        };

        Ok(PublishedPost { external_id })
    }
}
