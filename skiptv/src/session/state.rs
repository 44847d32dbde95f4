//! Per-device session state.

use std::fmt;

use crate::domain::{AdState, PlaybackSample, PlayerState};

/// Lifecycle phase of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Subscribing,
    Active,
    /// Watchdog fired; resubscribing without backoff
    Stale,
    /// Subscription failed or ended; backing off
    Error,
    Stopped,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Subscribing => "subscribing",
            Self::Active => "active",
            Self::Stale => "stale",
            Self::Error => "error",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Mutable state owned by one device's session task.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub ad_state: AdState,
    pub player_state: PlayerState,
    /// Video reported by the latest `nowPlaying`
    pub video_id: Option<String>,
    pub last_sample: Option<PlaybackSample>,
    /// Autoplay mode last reported by the screen
    pub autoplay: Option<bool>,
    pub playback_speed: f64,
    /// Set when the screen closed a player the user opened, e.g. shorts
    pub shorts_disconnected: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            ad_state: AdState::None,
            player_state: PlayerState::Unknown,
            video_id: None,
            last_sample: None,
            autoplay: None,
            playback_speed: 1.0,
            shorts_disconnected: false,
        }
    }
}
