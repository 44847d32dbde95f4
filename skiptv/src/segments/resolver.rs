//! Resolves the merged segment set for a video.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::cache::{ChannelCache, SegmentCache};
use crate::domain::SegmentSet;
use crate::error::{Error, Result};
use crate::providers::{ChannelLookup, SegmentSource};

use super::merge::merge_segments;

/// A lookup in progress, awaited by every caller asking for the same video.
type InflightLookup = Shared<BoxFuture<'static, std::result::Result<Arc<SegmentSet>, Arc<Error>>>>;

/// Parameters for creating a resolver.
pub struct ResolverParams {
    pub source: Arc<dyn SegmentSource>,
    /// Only consulted when `whitelist` is non-empty
    pub channels: Option<Arc<dyn ChannelLookup>>,
    pub whitelist: HashSet<String>,
    pub segment_cache: Arc<SegmentCache>,
    pub channel_cache: Arc<ChannelCache>,
}

struct Lookup {
    source: Arc<dyn SegmentSource>,
    channels: Option<Arc<dyn ChannelLookup>>,
    whitelist: HashSet<String>,
    segment_cache: Arc<SegmentCache>,
    channel_cache: Arc<ChannelCache>,
}

/// Cache-backed segment resolution shared by every device session.
///
/// Concurrent lookups for one video share a single provider request.
pub struct SegmentResolver {
    lookup: Arc<Lookup>,
    inflight: Mutex<HashMap<String, InflightLookup>>,
}

impl SegmentResolver {
    pub fn new(params: ResolverParams) -> Self {
        let ResolverParams {
            source,
            channels,
            whitelist,
            segment_cache,
            channel_cache,
        } = params;

        Self {
            lookup: Arc::new(Lookup {
                source,
                channels,
                whitelist,
                segment_cache,
                channel_cache,
            }),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver with no whitelist and fresh default caches.
    pub fn with_source(source: Arc<dyn SegmentSource>) -> Self {
        Self::new(ResolverParams {
            source,
            channels: None,
            whitelist: HashSet::new(),
            segment_cache: Arc::new(SegmentCache::new()),
            channel_cache: Arc::new(ChannelCache::new()),
        })
    }

    pub fn segment_cache(&self) -> &SegmentCache {
        &self.lookup.segment_cache
    }

    /// Resolve the segment set for a video, consulting the cache first.
    ///
    /// Videos from whitelisted channels resolve to an empty permanent set.
    pub async fn resolve(&self, video_id: &str) -> Result<Arc<SegmentSet>> {
        if let Some(set) = self.lookup.segment_cache.get(video_id) {
            return Ok(set);
        }

        let pending = self
            .inflight
            .lock()
            .entry(video_id.to_string())
            .or_insert_with(|| {
                let lookup = self.lookup.clone();
                let video_id = video_id.to_string();
                async move { lookup.load(&video_id).await.map_err(Arc::new) }
                    .boxed()
                    .shared()
            })
            .clone();

        let result = pending.clone().await;

        let mut inflight = self.inflight.lock();
        if inflight
            .get(video_id)
            .is_some_and(|current| current.ptr_eq(&pending))
        {
            inflight.remove(video_id);
        }
        drop(inflight);

        result.map_err(Error::Lookup)
    }
}

impl Lookup {
    async fn load(&self, video_id: &str) -> Result<Arc<SegmentSet>> {
        if self.is_whitelisted(video_id).await? {
            debug!(video_id = %video_id, "Channel is whitelisted, not skipping");
            let set = Arc::new(SegmentSet::empty_permanent());
            self.segment_cache.insert(video_id, set.clone());
            return Ok(set);
        }

        trace!(video_id = %video_id, "Fetching segments");
        let raw = self.source.fetch_segments(video_id).await?;
        let set = Arc::new(merge_segments(&raw));
        debug!(
            video_id = %video_id,
            raw = raw.len(),
            merged = set.len(),
            permanent = set.permanent,
            "Resolved segments"
        );
        self.segment_cache.insert(video_id, set.clone());
        Ok(set)
    }

    async fn is_whitelisted(&self, video_id: &str) -> Result<bool> {
        if self.whitelist.is_empty() {
            return Ok(false);
        }
        let Some(channels) = &self.channels else {
            return Ok(false);
        };

        let channel_id = match self.channel_cache.get(video_id) {
            Some(channel_id) => channel_id,
            None => {
                let channel_id = channels.channel_of(video_id).await?;
                self.channel_cache.insert(video_id, channel_id.clone());
                channel_id
            }
        };

        Ok(self.whitelist.contains(&channel_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawSegment;
    use crate::test_support::{FakeChannelLookup, FakeSegmentSource};
    use std::time::Duration;

    fn resolver(
        source: Arc<FakeSegmentSource>,
        channels: Arc<FakeChannelLookup>,
        whitelist: &[&str],
    ) -> SegmentResolver {
        SegmentResolver::new(ResolverParams {
            source,
            channels: Some(channels),
            whitelist: whitelist.iter().map(|id| id.to_string()).collect(),
            segment_cache: Arc::new(SegmentCache::new()),
            channel_cache: Arc::new(ChannelCache::new()),
        })
    }

    #[tokio::test]
    async fn test_resolve_merges_and_caches() {
        let source = Arc::new(FakeSegmentSource::new());
        source.insert(
            "vid",
            vec![
                RawSegment::new(0.0, 10.0, "a", true),
                RawSegment::new(9.5, 15.0, "b", true),
            ],
        );
        let channels = Arc::new(FakeChannelLookup::new());
        let resolver = resolver(source.clone(), channels.clone(), &[]);

        let set = resolver.resolve("vid").await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.permanent);

        let again = resolver.resolve("vid").await.unwrap();
        assert!(Arc::ptr_eq(&set, &again));
        assert_eq!(source.calls(), 1);
        assert_eq!(channels.calls(), 0);
    }

    #[tokio::test]
    async fn test_whitelisted_channel_short_circuits() {
        let source = Arc::new(FakeSegmentSource::new());
        source.insert("vid", vec![RawSegment::new(0.0, 10.0, "a", false)]);
        let channels = Arc::new(FakeChannelLookup::new());
        channels.insert("vid", "UC-friend");
        let resolver = resolver(source.clone(), channels.clone(), &["UC-friend"]);

        let set = resolver.resolve("vid").await.unwrap();
        assert!(set.is_empty());
        assert!(set.permanent);
        assert_eq!(source.calls(), 0);

        resolver.resolve("vid").await.unwrap();
        assert_eq!(channels.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_whitelisted_channel_fetches() {
        let source = Arc::new(FakeSegmentSource::new());
        source.insert("vid", vec![RawSegment::new(0.0, 10.0, "a", false)]);
        let channels = Arc::new(FakeChannelLookup::new());
        channels.insert("vid", "UC-other");
        let resolver = resolver(source.clone(), channels, &["UC-friend"]);

        let set = resolver.resolve("vid").await.unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.permanent);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates_uncached() {
        let source = Arc::new(FakeSegmentSource::new());
        source.fail(true);
        let resolver = SegmentResolver::with_source(source.clone());

        assert!(resolver.resolve("vid").await.is_err());
        assert!(resolver.segment_cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_lookups_share_one_fetch() {
        let source = Arc::new(FakeSegmentSource::new());
        source.insert("vid", vec![RawSegment::new(5.0, 8.0, "a", true)]);
        source.set_delay(Duration::from_millis(200));
        let resolver = SegmentResolver::with_source(source.clone());

        let (first, second) = tokio::join!(resolver.resolve("vid"), resolver.resolve("vid"));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 1);
        assert!(resolver.inflight.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_failure_is_retried_later() {
        let source = Arc::new(FakeSegmentSource::new());
        source.set_delay(Duration::from_millis(200));
        source.fail(true);
        let resolver = SegmentResolver::with_source(source.clone());

        let (first, second) = tokio::join!(resolver.resolve("vid"), resolver.resolve("vid"));
        assert!(matches!(first, Err(Error::Lookup(_))));
        assert!(second.is_err());
        assert_eq!(source.calls(), 1);

        source.fail(false);
        assert!(resolver.resolve("vid").await.is_ok());
        assert_eq!(source.calls(), 2);
    }
}
