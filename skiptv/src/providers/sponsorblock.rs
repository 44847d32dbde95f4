//! SponsorBlock segment database client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use super::{SegmentSource, ViewTracker};
use crate::domain::RawSegment;
use crate::error::{Error, Result};

/// Default SponsorBlock API root.
pub const DEFAULT_API_URL: &str = "https://sponsor.ajay.app/api/";

const PROVIDER: &str = "sponsorblock";

/// Length of the hashed video id prefix sent for k-anonymity lookups.
const HASH_PREFIX_LEN: usize = 4;

#[derive(Debug, Deserialize)]
struct VideoSegments {
    #[serde(rename = "videoID")]
    video_id: String,
    #[serde(default)]
    segments: Vec<ApiSegment>,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    segment: [f64; 2],
    #[serde(rename = "UUID")]
    uuid: String,
    #[serde(default)]
    locked: i64,
}

/// Client for the SponsorBlock API.
pub struct SponsorBlockClient {
    http: Client,
    base_url: Url,
    categories: Vec<String>,
}

impl SponsorBlockClient {
    pub fn new(http: Client, categories: Vec<String>) -> Result<Self> {
        Self::with_base_url(http, DEFAULT_API_URL, categories)
    }

    pub fn with_base_url(http: Client, base_url: &str, categories: Vec<String>) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid SponsorBlock URL: {e}")))?;
        Ok(Self {
            http,
            base_url,
            categories,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::provider(PROVIDER, format!("invalid endpoint {path}: {e}")))
    }
}

/// First characters of the hex SHA-256 of a video id.
pub fn hash_prefix(video_id: &str) -> String {
    let digest = hex::encode(Sha256::digest(video_id.as_bytes()));
    digest[..HASH_PREFIX_LEN].to_string()
}

/// Pick the entry for `video_id` out of a hash-prefix response.
fn segments_for_video(entries: Vec<VideoSegments>, video_id: &str) -> Vec<RawSegment> {
    entries
        .into_iter()
        .find(|entry| entry.video_id == video_id)
        .map(|entry| {
            entry
                .segments
                .into_iter()
                .map(|s| RawSegment::new(s.segment[0], s.segment[1], s.uuid, s.locked == 1))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SegmentSource for SponsorBlockClient {
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<RawSegment>> {
        let url = self.endpoint(&format!("skipSegments/{}", hash_prefix(video_id)))?;
        let mut query: Vec<(&str, &str)> = self
            .categories
            .iter()
            .map(|category| ("category", category.as_str()))
            .collect();
        query.push(("actionType", "skip"));
        query.push(("service", "YouTube"));

        let response = self.http.get(url).query(&query).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(video_id = %video_id, "No segments published");
                return Ok(Vec::new());
            }
            status if !status.is_success() => {
                return Err(Error::provider(
                    PROVIDER,
                    format!("skipSegments returned {status}"),
                ));
            }
            _ => {}
        }

        let entries: Vec<VideoSegments> = response.json().await?;
        let segments = segments_for_video(entries, video_id);
        debug!(video_id = %video_id, count = segments.len(), "Fetched segments");
        Ok(segments)
    }
}

#[async_trait]
impl ViewTracker for SponsorBlockClient {
    async fn report(&self, ids: &[String]) -> Result<()> {
        let url = self.endpoint("viewedVideoSponsorTime/")?;
        for id in ids {
            let response = self
                .http
                .post(url.clone())
                .query(&[("UUID", id.as_str())])
                .send()
                .await?;
            if !response.status().is_success() {
                warn!(uuid = %id, status = %response.status(), "Failed to mark segment viewed");
            }
        }
        Ok(())
    }
}
