//! Provider-neutral publish inputs and outputs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported publishing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Facebook Page.
    FacebookPage,
    /// Instagram Business account.
    Instagram,
    /// Zalo Official Account.
    Zalo,
}

impl Provider {
    /// All providers.
    pub const ALL: [Self; 3] = [Self::FacebookPage, Self::Instagram, Self::Zalo];

    /// Stored tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FacebookPage => "facebook_page",
            Self::Instagram => "instagram",
            Self::Zalo => "zalo",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown provider: {s}"))
    }
}

/// The account a post is published to.
#[derive(Clone)]
pub struct PublishTarget {
    /// Destination provider.
    pub provider: Provider,
    /// Our social account id, for logging.
    pub account_id: String,
    /// Page id, Instagram user id or OA id on the provider side.
    pub provider_id: String,
    /// Display name of the account.
    pub name: String,
    /// Decrypted access token.
    pub access_token: String,
    /// Provider-specific account metadata.
    pub metadata: serde_json::Value,
}

impl fmt::Debug for PublishTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishTarget")
            .field("provider", &self.provider)
            .field("account_id", &self.account_id)
            .field("provider_id", &self.provider_id)
            .field("name", &self.name)
            .field("access_token", &"[redacted]")
            .finish_non_exhaustive()
    }
}

/// What to publish.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    /// Our post id, for logging.
    pub post_id: String,
    /// Optional title. Only articles use it.
    pub title: Option<String>,
    /// Body in the markdown dialect.
    pub content: String,
    /// Ordered media URLs.
    pub media_urls: Vec<String>,
}

impl PublishRequest {
    /// Media with their detected kind, in order.
    #[must_use]
    pub fn media(&self) -> Vec<MediaItem<'_>> {
        self.media_urls
            .iter()
            .map(|url| MediaItem {
                url,
                kind: MediaKind::from_url(url),
            })
            .collect()
    }
}

/// Kind of an attached media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image.
    Image,
    /// Video.
    Video,
}

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "m4v", "webm", "avi"];

impl MediaKind {
    /// Guess the kind from the URL path extension.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match ext {
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => Self::Video,
            _ => Self::Image,
        }
    }
}

/// A media URL and its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaItem<'a> {
    /// Public URL the provider fetches from.
    pub url: &'a str,
    /// Detected kind.
    pub kind: MediaKind,
}

/// A post that now exists on the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedPost {
    /// Stable provider-side id.
    pub external_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_tags() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
        assert!("twitter".parse::<Provider>().is_err());
        assert_eq!(
            serde_json::to_string(&Provider::FacebookPage).unwrap_or_default(),
            "\"facebook_page\""
        );
    }

    #[test]
    fn test_media_kind_from_url() {
        assert_eq!(MediaKind::from_url("https://cdn.example/a.jpg"), MediaKind::Image);
        assert_eq!(MediaKind::from_url("https://cdn.example/a.MP4"), MediaKind::Video);
        assert_eq!(
            MediaKind::from_url("https://cdn.example/clip.mov?sig=abc.png"),
            MediaKind::Video
        );
        assert_eq!(MediaKind::from_url("https://cdn.example/blob"), MediaKind::Image);
    }

    #[test]
    fn test_target_debug_hides_token() {
        let target = PublishTarget {
            provider: Provider::Zalo,
            account_id: "acct1".to_string(),
            provider_id: "oa1".to_string(),
            name: "Shop".to_string(),
            access_token: "secret-token".to_string(),
            metadata: serde_json::Value::Null,
        };
        assert!(!format!("{target:?}").contains("secret-token"));
    }
}
