//! Segment and channel lookup caches.
//!
//! Both caches are bounded LRU maps with per-entry TTL. Segment sets built
//! only from locked sources are stored as permanent and never expire.

mod ttl_lru;

pub use ttl_lru::TtlLruCache;

use std::sync::Arc;
use std::time::Duration;

use crate::domain::SegmentSet;

/// Default TTL for resolved segment sets (5 minutes).
pub const SEGMENT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default capacity of the segment cache.
pub const SEGMENT_CACHE_CAPACITY: usize = 10;

/// Default TTL for channel lookups (1 hour).
pub const CHANNEL_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default capacity of the channel cache.
pub const CHANNEL_CACHE_CAPACITY: usize = 100;

/// Resolved segment sets keyed by video id.
#[derive(Debug)]
pub struct SegmentCache {
    inner: TtlLruCache<Arc<SegmentSet>>,
}

impl SegmentCache {
    pub fn new() -> Self {
        Self::with_settings(SEGMENT_CACHE_CAPACITY, SEGMENT_CACHE_TTL)
    }

    pub fn with_settings(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: TtlLruCache::new(capacity, ttl),
        }
    }

    pub fn get(&self, video_id: &str) -> Option<Arc<SegmentSet>> {
        self.inner.get(video_id)
    }

    /// Store a set; permanence follows the set's own flag.
    pub fn insert(&self, video_id: &str, set: Arc<SegmentSet>) {
        let permanent = set.permanent;
        self.inner.set(video_id, set, permanent);
    }

    pub fn delete(&self, video_id: &str) -> bool {
        self.inner.delete(video_id)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for SegmentCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Channel ids keyed by video id.
#[derive(Debug)]
pub struct ChannelCache {
    inner: TtlLruCache<String>,
}

impl ChannelCache {
    pub fn new() -> Self {
        Self::with_settings(CHANNEL_CACHE_CAPACITY, CHANNEL_CACHE_TTL)
    }

    pub fn with_settings(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: TtlLruCache::new(capacity, ttl),
        }
    }

    pub fn get(&self, video_id: &str) -> Option<String> {
        self.inner.get(video_id)
    }

    pub fn insert(&self, video_id: &str, channel_id: impl Into<String>) {
        self.inner.set(video_id, channel_id.into(), false);
    }

    pub fn delete(&self, video_id: &str) -> bool {
        self.inner.delete(video_id)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for ChannelCache {
    fn default() -> Self {
        Self::new()
    }
}
