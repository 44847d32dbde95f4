use std::time::Duration;

use crate::domain::SegmentSet;

/// Positions below this count as the opening second of playback.
const OPENING_WINDOW_SECS: f64 = 1.0;

/// The boundary a skip acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipPlan {
    /// Position at which the seek should happen
    pub start: f64,
    /// Position to seek to
    pub end: f64,
    pub ids: Vec<String>,
}

/// Select the next segment to skip from `position`.
///
/// During the opening second only the first segment is checked for already
/// covering the position; otherwise the first segment starting strictly
/// after `position` is chosen.
pub fn plan_skip(set: &SegmentSet, position: f64) -> Option<SkipPlan> {
    if let Some(first) = set.first() {
        if position < OPENING_WINDOW_SECS && first.end > OPENING_WINDOW_SECS && first.contains(position)
        {
            return Some(SkipPlan {
                start: position,
                end: first.end,
                ids: first.ids.clone(),
            });
        }
    }

    set.iter()
        .find(|segment| segment.start > position)
        .map(|segment| SkipPlan {
            start: segment.start,
            end: segment.end,
            ids: segment.ids.clone(),
        })
}

/// Time to wait before seeking, clamped at zero.
///
/// `(start - position) - elapsed - offset`, where `elapsed` is local time
/// since the sample was observed and `offset` the device latency in seconds.
pub fn compute_delay(plan: &SkipPlan, position: f64, elapsed: Duration, offset: f64) -> Duration {
    let secs = (plan.start - position) - elapsed.as_secs_f64() - offset;
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}
