//! Canonicalization of raw skip intervals.
//!
//! Raw intervals may overlap partially in either direction and arrive in any
//! order. Merging runs two full pairwise extension passes (ends, then
//! starts) before combining neighbours closer than [`MERGE_GAP_SECS`]; a
//! single sort-and-sweep misses chains that only overlap after the opposite
//! extension has been applied.

use std::cmp::Ordering;

use crate::domain::{RawSegment, Segment, SegmentSet};

/// Segments closer than this are combined.
pub const MERGE_GAP_SECS: f64 = 1.0;

/// Merge raw records for one video into a canonical set.
///
/// The set is permanent only when every record is locked; an empty input
/// yields an empty permanent set.
pub fn merge_segments(raw: &[RawSegment]) -> SegmentSet {
    let permanent = raw.iter().all(|segment| segment.locked);
    let segments = merge(raw.iter().map(Segment::from).collect());
    SegmentSet::new(segments, permanent)
}

/// Merge already-built segments. Applying this to its own output is a no-op.
pub fn merge(mut segments: Vec<Segment>) -> Vec<Segment> {
    if segments.len() < 2 {
        return segments;
    }

    segments.sort_by(|a, b| cmp_f64(a.end, b.end));
    extend_ends(&mut segments);

    segments.sort_by(|a, b| cmp_f64(a.start, b.start));
    extend_starts(&mut segments);
    // Start extension only lowers starts; keep the walk in start order
    segments.sort_by(|a, b| cmp_f64(a.start, b.start));

    combine(segments)
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

/// Any segment ending inside another takes the other's end.
fn extend_ends(segments: &mut [Segment]) {
    for i in 0..segments.len() {
        for j in 0..segments.len() {
            let (start, end) = (segments[j].start, segments[j].end);
            let current = segments[i].end;
            if start <= current && current <= end {
                segments[i].end = end;
            }
        }
    }
}

/// Any segment starting inside another takes the other's start.
fn extend_starts(segments: &mut [Segment]) {
    for i in (0..segments.len()).rev() {
        for j in (0..segments.len()).rev() {
            let (start, end) = (segments[j].start, segments[j].end);
            let current = segments[i].start;
            if start <= current && current <= end {
                segments[i].start = start;
            }
        }
    }
}

fn combine(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(last) if segment.start - last.end < MERGE_GAP_SECS => {
                last.end = last.end.max(segment.end);
                last.absorb_ids(&segment.ids);
                last.locked &= segment.locked;
            }
            _ => merged.push(segment),
        }
    }
    merged
}
