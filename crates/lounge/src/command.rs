//! Outbound remote commands.

use std::fmt;

/// A command sent to a lounge screen.
///
/// Each command maps to a remote command name and a flat list of form
/// fields; the transport prefixes field keys with the request slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Set the absolute volume and mute flag
    SetVolume { volume: u8, muted: bool },
    /// Skip the currently playing advertisement
    SkipAd,
    /// Seek to an absolute position in seconds
    SeekTo { new_time: f64 },
    /// Replace the playlist with a single video and start it
    SetPlaylist { video_id: String },
    /// Ask the screen to emit a fresh `nowPlaying` event
    GetNowPlaying,
    /// Enable or disable autoplay of the up-next video
    SetAutoplayMode { enabled: bool },
}

impl Command {
    /// Remote command name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetVolume { .. } => "setVolume",
            Self::SkipAd => "skipAd",
            Self::SeekTo { .. } => "seekTo",
            Self::SetPlaylist { .. } => "setPlaylist",
            Self::GetNowPlaying => "getNowPlaying",
            Self::SetAutoplayMode { .. } => "setAutoplayMode",
        }
    }

    /// Command payload as `(key, value)` pairs.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::SetVolume { volume, muted } => vec![
                ("volume", volume.to_string()),
                ("muted", muted.to_string()),
            ],
            Self::SeekTo { new_time } => vec![("newTime", new_time.to_string())],
            Self::SetPlaylist { video_id } => vec![("videoId", video_id.clone())],
            Self::SetAutoplayMode { enabled } => {
                let mode = if *enabled { "ENABLED" } else { "DISABLED" };
                vec![("autoplayMode", mode.to_string())]
            }
            Self::SkipAd | Self::GetNowPlaying => Vec::new(),
        }
    }

    /// Encode as the form body of a single-request bind POST.
    pub fn to_form(&self, ofs: u64) -> Vec<(String, String)> {
        let mut form = vec![
            ("count".to_string(), "1".to_string()),
            ("ofs".to_string(), ofs.to_string()),
            ("req0__sc".to_string(), self.name().to_string()),
        ];
        form.extend(
            self.fields()
                .into_iter()
                .map(|(key, value)| (format!("req0_{key}"), value)),
        );
        form
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
