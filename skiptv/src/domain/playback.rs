use std::time::Duration;

use tokio::time::Instant;

/// Point-in-time playback observation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSample {
    pub video_id: String,
    /// Reported position in seconds
    pub position: f64,
    /// Local time the sample was received
    pub observed_at: Instant,
}

impl PlaybackSample {
    pub fn new(video_id: impl Into<String>, position: f64) -> Self {
        Self::observed(video_id, position, Instant::now())
    }

    pub fn observed(video_id: impl Into<String>, position: f64, observed_at: Instant) -> Self {
        Self {
            video_id: video_id.into(),
            position,
            observed_at,
        }
    }

    /// Local time elapsed since the sample was observed.
    pub fn elapsed(&self) -> Duration {
        self.observed_at.elapsed()
    }
}

/// Advertisement state derived from the latest ad event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdState {
    #[default]
    None,
    Playing,
    Skippable,
}

impl AdState {
    pub fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Remote player state as reported by `state` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Unknown,
    Stopped,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    /// Decode a remote state code.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "0" => Self::Stopped,
            "1" => Self::Playing,
            "2" => Self::Paused,
            "3" => Self::Buffering,
            "5" => Self::Cued,
            _ => Self::Unknown,
        }
    }

    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Last known volume of a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeShadow {
    pub volume: u8,
    pub muted: bool,
}

impl Default for VolumeShadow {
    fn default() -> Self {
        Self {
            volume: 100,
            muted: false,
        }
    }
}
