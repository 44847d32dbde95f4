//! Core domain types shared by the session engine.

mod device;
mod playback;
mod segment;

pub use device::Device;
pub use playback::{AdState, PlaybackSample, PlayerState, VolumeShadow};
pub use segment::{RawSegment, Segment, SegmentSet};
