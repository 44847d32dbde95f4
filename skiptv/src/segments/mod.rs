//! Segment resolution: merge raw intervals and resolve sets per video.

pub mod merge;
pub mod resolver;

pub use merge::{MERGE_GAP_SECS, merge, merge_segments};
pub use resolver::{ResolverParams, SegmentResolver};
