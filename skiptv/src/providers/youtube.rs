//! YouTube Data API channel lookup.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::ChannelLookup;
use crate::error::{Error, Result};

/// Default YouTube Data API root.
pub const DEFAULT_API_URL: &str = "https://www.googleapis.com/youtube/v3/";

const PROVIDER: &str = "youtube";

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    channel_id: String,
}

/// Resolves video owners through the YouTube Data API.
pub struct YouTubeDataClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl YouTubeDataClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(http, DEFAULT_API_URL, api_key)
    }

    pub fn with_base_url(http: Client, base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid YouTube API URL: {e}")))?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
        })
    }
}

fn first_channel(response: VideoListResponse, video_id: &str) -> Result<String> {
    response
        .items
        .into_iter()
        .next()
        .map(|item| item.snippet.channel_id)
        .ok_or_else(|| Error::provider(PROVIDER, format!("no video found for {video_id}")))
}

#[async_trait]
impl ChannelLookup for YouTubeDataClient {
    async fn channel_of(&self, video_id: &str) -> Result<String> {
        let url = self
            .base_url
            .join("videos")
            .map_err(|e| Error::provider(PROVIDER, e.to_string()))?;
        let response = self
            .http
            .get(url)
            .query(&[
                ("id", video_id),
                ("key", self.api_key.as_str()),
                ("part", "snippet"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(PROVIDER, format!("videos returned {status}")));
        }

        first_channel(response.json().await?, video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_channel() {
        let response: VideoListResponse = serde_json::from_str(
            r#"{"kind":"youtube#videoListResponse","items":[{"id":"v","snippet":{"channelId":"UC1","title":"t"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_channel(response, "v").unwrap(), "UC1");
    }

    #[test]
    fn test_first_channel_without_items() {
        let response: VideoListResponse = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert!(matches!(
            first_channel(response, "v"),
            Err(Error::Provider { .. })
        ));
    }
}
