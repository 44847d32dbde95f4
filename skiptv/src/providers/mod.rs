//! External collaborators consumed by segment resolution and skipping.
//!
//! The session engine only depends on the traits here; HTTP-backed
//! implementations live in the submodules.

pub mod sponsorblock;
pub mod youtube;

pub use sponsorblock::SponsorBlockClient;
pub use youtube::YouTubeDataClient;

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::RawSegment;
use crate::error::Result;

/// User agent sent to external APIs.
pub const USER_AGENT: &str = concat!("skiptv/", env!("CARGO_PKG_VERSION"));

/// Timeout for provider requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of raw skip segments for a video.
#[async_trait]
pub trait SegmentSource: Send + Sync {
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<RawSegment>>;
}

/// Maps a video to the channel that owns it.
#[async_trait]
pub trait ChannelLookup: Send + Sync {
    async fn channel_of(&self, video_id: &str) -> Result<String>;
}

/// Receives the ids of segments that were skipped.
#[async_trait]
pub trait ViewTracker: Send + Sync {
    async fn report(&self, ids: &[String]) -> Result<()>;
}

/// Build the HTTP client shared by all providers.
pub fn build_http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}
