//! Zalo Official Account adapter.
//!
//! Zalo OA has no feed post API for text and photos, so posts are published
//! as articles.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use socialcast_common::{AppResult, config::ProvidersConfig};
use socialcast_format::Style;
use tracing::debug;

use crate::error::PublishError;
use crate::http::{build_client, id_field, send_json};
use crate::registry::PlatformPublisher;
use crate::types::{MediaKind, Provider, PublishRequest, PublishTarget, PublishedPost};

/// Maximum article title length.
pub const MAX_TITLE_CHARS: usize = 150;

/// Maximum article description length.
pub const MAX_DESCRIPTION_CHARS: usize = 300;

/// Maximum article body length. Longer bodies are rejected, not truncated.
pub const MAX_BODY_CHARS: usize = 100_000;

/// Publishes articles to Zalo Official Accounts.
#[derive(Clone)]
pub struct ZaloPublisher {
    client: Client,
    base_url: String,
}

impl ZaloPublisher {
    /// Create a new adapter.
    pub fn new(config: &ProvidersConfig) -> AppResult<Self> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.http_timeout_secs))?,
            base_url: config.zalo_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Override the API base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

/// Build the article payload.
pub fn build_article(target: &PublishTarget, request: &PublishRequest) -> Result<Value, PublishError> {
    let paragraphs = socialcast_format::to_paragraphs(&request.content, Style::Plain);
    let body_chars: usize = paragraphs.iter().map(|p| socialcast_format::char_count(p)).sum();
    if body_chars > MAX_BODY_CHARS {
        return Err(PublishError::InvalidContent(format!(
            "Zalo article body is {body_chars} characters, the limit is {MAX_BODY_CHARS}"
        )));
    }

    let title = request
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(socialcast_format::to_plain_text)
        .or_else(|| paragraphs.first().cloned())
        .unwrap_or_else(|| target.name.clone());
    let description = paragraphs.join(" ");

    let media = request.media();
    let mut body: Vec<Value> = paragraphs
        .iter()
        .map(|p| json!({ "type": "text", "content": p }))
        .collect();
    for item in &media {
        body.push(match item.kind {
            MediaKind::Image => json!({ "type": "image", "url": item.url }),
            MediaKind::Video => json!({ "type": "text", "content": item.url }),
        });
    }

    let mut article = json!({
        "type": "normal",
        "title": socialcast_format::truncate(&title, MAX_TITLE_CHARS),
        "author": target.name,
        "description": socialcast_format::truncate(&description, MAX_DESCRIPTION_CHARS),
        "body": body,
        "status": "show",
        "comment": "show",
    });
    if let Some(cover) = media.iter().find(|m| m.kind == MediaKind::Image) {
        article["cover"] = json!({
            "cover_type": "photo",
            "photo_url": cover.url,
            "status": "show",
        });
    }
    Ok(article)
}

#[async_trait]
impl PlatformPublisher for ZaloPublisher {
    fn provider(&self) -> Provider {
        Provider::Zalo
    }

    async fn publish(
        &self,
        target: &PublishTarget,
        request: &PublishRequest,
    ) -> Result<PublishedPost, PublishError> {
        let article = build_article(target, request)?;

        debug!(
            post_id = %request.post_id,
            account_id = %target.account_id,
            "Publishing Zalo article"
        );

        let res = send_json(
            self.client
                .post(format!("{}/article/create", self.base_url))
                .header("access_token", &target.access_token)
                .json(&article),
        )
        .await?;

        // Zalo reports failures in the body with HTTP 200
        let code = res.get("error").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let message = res
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(PublishError::permanent(format!("Zalo error {code}: {message}")));
        }

        let data = res.get("data").unwrap_or(&Value::Null);
        let external_id = id_field(data, "token")
            .or_else(|| id_field(data, "id"))
            .ok_or_else(|| PublishError::permanent(format!("response did not include an article id: {res}")))?;

        Ok(PublishedPost { external_id })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn target() -> PublishTarget {
        PublishTarget {
            provider: Provider::Zalo,
            account_id: "acct3".to_string(),
            provider_id: "oa1".to_string(),
            name: "Coffee OA".to_string(),
            access_token: "oa-token".to_string(),
            metadata: Value::Null,
        }
    }

    fn request(title: Option<&str>, content: &str, media: &[&str]) -> PublishRequest {
        PublishRequest {
            post_id: "post1".to_string(),
            title: title.map(ToString::to_string),
            content: content.to_string(),
            media_urls: media.iter().map(ToString::to_string).collect(),
        }
    }

    async fn publisher(server: &MockServer) -> ZaloPublisher {
        ZaloPublisher::new(&ProvidersConfig::default())
            .unwrap()
            .with_base_url(server.uri())
    }

    #[test]
    fn test_article_payload() {
        let article = build_article(
            &target(),
            &request(
                Some("**Grand** opening"),
                "Come by\n\n- free *coffee*",
                &["https://cdn.example/cover.jpg"],
            ),
        )
        .unwrap();

        assert_eq!(article["title"], "Grand opening");
        assert_eq!(article["description"], "Come by • free coffee");
        assert_eq!(article["cover"]["photo_url"], "https://cdn.example/cover.jpg");
        assert_eq!(article["body"][0]["content"], "Come by");
        assert_eq!(article["body"][2]["type"], "image");
    }

    #[test]
    fn test_title_falls_back_to_first_paragraph_and_is_truncated() {
        let content = "x".repeat(400);
        let article = build_article(&target(), &request(None, &content, &[])).unwrap();

        let title = article["title"].as_str().unwrap();
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        let description = article["description"].as_str().unwrap();
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(article.get("cover").is_none());
    }

    #[test]
    fn test_oversized_body_is_rejected() {
        let content = "y".repeat(MAX_BODY_CHARS + 1);
        let err = build_article(&target(), &request(None, &content, &[])).unwrap_err();
        assert!(matches!(err, PublishError::InvalidContent(_)));
    }

    #[tokio::test]
    async fn test_publish_returns_article_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/article/create"))
            .and(header("access_token", "oa-token"))
            .and(body_partial_json(json!({"type": "normal", "title": "Hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": 0,
                "message": "Success",
                "data": {"token": "article-token-1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let published = publisher(&server)
            .await
            .publish(&target(), &request(Some("Hello"), "World", &[]))
            .await
            .unwrap();
        assert_eq!(published.external_id, "article-token-1");
    }

    #[tokio::test]
    async fn test_body_error_code_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/article/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": -216,
                "message": "Access token is invalid"
            })))
            .mount(&server)
            .await;

        let err = publisher(&server)
            .await
            .publish(&target(), &request(None, "World", &[]))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("-216"));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/article/create"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = publisher(&server)
            .await
            .publish(&target(), &request(None, "World", &[]))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
