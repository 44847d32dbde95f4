//! Typed lounge events.
//!
//! Screens report every field as a string, sometimes as a number or bool.
//! Each event the engine reacts to is decoded once into a closed variant;
//! anything else becomes [`LoungeEvent::Other`].

use lounge_client::RawEvent;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{PlayerState, VolumeShadow};

/// Reason given when the screen was closed by the user, e.g. for shorts.
pub const USER_DISCONNECT_REASON: &str = "disconnectedByUserScreenInitiated";

/// Device type of screens listed in `loungeStatus`.
const LOUNGE_SCREEN: &str = "LOUNGE_SCREEN";

/// A required field was missing or malformed.
#[derive(Debug, Error)]
#[error("malformed {event} event: {reason}")]
pub struct EventDecodeError {
    pub event: String,
    pub reason: String,
}

impl EventDecodeError {
    fn new(event: &str, reason: impl Into<String>) -> Self {
        Self {
            event: event.to_string(),
            reason: reason.into(),
        }
    }
}

/// Ad lifecycle as reported by `onAdStateChange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdPhase {
    Ended,
    Active,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum LoungeEvent {
    StateChange {
        state: PlayerState,
        position: Option<f64>,
        video_id: Option<String>,
    },
    NowPlaying {
        video_id: Option<String>,
        position: Option<f64>,
        state: PlayerState,
    },
    AdStateChange {
        phase: AdPhase,
        skip_enabled: bool,
    },
    AdPlaying {
        content_video_id: Option<String>,
        skip_enabled: bool,
    },
    VolumeChanged(VolumeShadow),
    AutoplayUpNext {
        video_id: Option<String>,
    },
    LoungeStatus {
        /// `clientName` of every connected lounge screen
        screen_clients: Vec<String>,
    },
    SubtitlesTrackChanged {
        video_id: Option<String>,
    },
    ScreenDisconnected {
        reason: Option<String>,
    },
    AutoplayModeChanged {
        enabled: Option<bool>,
    },
    PlaybackSpeedChanged {
        speed: Option<f64>,
    },
    Other(String),
}

impl LoungeEvent {
    /// Decode a raw event.
    pub fn decode(raw: &RawEvent) -> Result<Self, EventDecodeError> {
        let payload = &raw.payload;
        let name = raw.name.as_str();

        let event = match name {
            "onStateChange" => {
                let state = text(payload, "state")
                    .ok_or_else(|| EventDecodeError::new(name, "missing state"))?;
                Self::StateChange {
                    state: PlayerState::from_code(&state),
                    position: number(payload, "currentTime"),
                    video_id: non_empty(payload, "videoId"),
                }
            }
            "nowPlaying" => Self::NowPlaying {
                video_id: non_empty(payload, "videoId"),
                position: number(payload, "currentTime"),
                state: text(payload, "state")
                    .map(|state| PlayerState::from_code(&state))
                    .unwrap_or_default(),
            },
            "onAdStateChange" => {
                let ad_state = text(payload, "adState")
                    .ok_or_else(|| EventDecodeError::new(name, "missing adState"))?;
                Self::AdStateChange {
                    phase: if ad_state == "0" {
                        AdPhase::Ended
                    } else {
                        AdPhase::Active
                    },
                    skip_enabled: flag(payload, "isSkipEnabled").unwrap_or(false),
                }
            }
            "adPlaying" => Self::AdPlaying {
                content_video_id: non_empty(payload, "contentVideoId"),
                skip_enabled: flag(payload, "isSkipEnabled").unwrap_or(false),
            },
            "onVolumeChanged" => {
                let volume = number(payload, "volume")
                    .ok_or_else(|| EventDecodeError::new(name, "missing volume"))?;
                let muted = flag(payload, "muted")
                    .ok_or_else(|| EventDecodeError::new(name, "missing muted"))?;
                Self::VolumeChanged(VolumeShadow {
                    volume: volume.clamp(0.0, 100.0).round() as u8,
                    muted,
                })
            }
            "autoplayUpNext" => Self::AutoplayUpNext {
                video_id: non_empty(payload, "videoId"),
            },
            "loungeStatus" => Self::LoungeStatus {
                screen_clients: screen_clients(payload)
                    .map_err(|reason| EventDecodeError::new(name, reason))?,
            },
            "onSubtitlesTrackChanged" => Self::SubtitlesTrackChanged {
                video_id: non_empty(payload, "videoId"),
            },
            "loungeScreenDisconnected" => Self::ScreenDisconnected {
                reason: non_empty(payload, "reason"),
            },
            "onAutoplayModeChanged" => Self::AutoplayModeChanged {
                enabled: text(payload, "autoplayMode").and_then(|mode| parse_autoplay(&mode)),
            },
            "onPlaybackSpeedChanged" => Self::PlaybackSpeedChanged {
                speed: number(payload, "playbackSpeed"),
            },
            other => Self::Other(other.to_string()),
        };

        Ok(event)
    }
}

/// A field rendered as text regardless of its JSON type.
fn text(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(payload: &Value, key: &str) -> Option<String> {
    text(payload, key).filter(|value| !value.is_empty())
}

fn number(payload: &Value, key: &str) -> Option<f64> {
    let value = match payload.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|value| value.is_finite())
}

fn flag(payload: &Value, key: &str) -> Option<bool> {
    match payload.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_autoplay(mode: &str) -> Option<bool> {
    match mode {
        "ENABLED" | "true" => Some(true),
        "DISABLED" | "false" => Some(false),
        _ => None,
    }
}

/// Client names of lounge screens listed in a `loungeStatus` payload.
///
/// `devices` is a JSON document embedded as a string, and each entry's
/// `deviceInfo` is another embedded document.
fn screen_clients(payload: &Value) -> Result<Vec<String>, String> {
    let devices = payload
        .get("devices")
        .and_then(Value::as_str)
        .ok_or("missing devices")?;
    let devices: Vec<Value> =
        serde_json::from_str(devices).map_err(|e| format!("invalid devices: {e}"))?;

    let clients = devices
        .iter()
        .filter(|device| device.get("type").and_then(Value::as_str) == Some(LOUNGE_SCREEN))
        .filter_map(|device| device.get("deviceInfo").and_then(Value::as_str))
        .filter_map(|info| serde_json::from_str::<Value>(info).ok())
        .filter_map(|info| info.get("clientName").and_then(Value::as_str).map(String::from))
        .collect();
    Ok(clients)
}
