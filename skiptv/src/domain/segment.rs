use serde::{Deserialize, Serialize};

/// A single skip interval as reported by a segment source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub id: String,
    /// Whether the boundaries are authoritative
    pub locked: bool,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, id: impl Into<String>, locked: bool) -> Self {
        Self {
            start,
            end,
            id: id.into(),
            locked,
        }
    }
}

/// A merged skip interval.
///
/// `ids` keeps every contributing source id in merge order, without
/// duplicates. `locked` holds only when every contributor was locked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub ids: Vec<String>,
    pub locked: bool,
}

impl Segment {
    pub fn new(start: f64, end: f64, ids: Vec<String>, locked: bool) -> Self {
        Self {
            start,
            end,
            ids,
            locked,
        }
    }

    /// Whether `position` falls in `[start, end)`.
    pub fn contains(&self, position: f64) -> bool {
        self.start <= position && position < self.end
    }

    /// Append ids from another segment, skipping ones already present.
    pub(crate) fn absorb_ids(&mut self, ids: &[String]) {
        for id in ids {
            if !self.ids.contains(id) {
                self.ids.push(id.clone());
            }
        }
    }
}

impl From<&RawSegment> for Segment {
    fn from(raw: &RawSegment) -> Self {
        Self::new(raw.start, raw.end, vec![raw.id.clone()], raw.locked)
    }
}

/// The resolved, merged segment list for one video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentSet {
    /// Sorted by start, pairwise separated by at least the merge gap
    pub segments: Vec<Segment>,
    /// Safe to cache without expiry
    pub permanent: bool,
}

impl SegmentSet {
    pub fn new(segments: Vec<Segment>, permanent: bool) -> Self {
        Self {
            segments,
            permanent,
        }
    }

    /// An empty set that never needs revalidation.
    pub fn empty_permanent() -> Self {
        Self::new(Vec::new(), true)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// Every source id across the set, in segment order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .flat_map(|segment| segment.ids.iter().map(String::as_str))
    }
}
