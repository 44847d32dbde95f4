//! Event classification.
//!
//! [`classify`] applies an event's state transition and returns the
//! reactions the session must carry out. It never performs I/O.

use tokio::time::Instant;
use tracing::debug;

use super::events::{AdPhase, LoungeEvent, USER_DISCONNECT_REASON};
use super::state::SessionState;
use crate::domain::{AdState, PlaybackSample, PlayerState, VolumeShadow};

/// Remote clients that cannot share a lounge with this remote.
pub const CLIENT_BLACKLIST: &[&str] = &["TVHTML5_FOR_KIDS"];

/// Ad and autoplay behaviour configured by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub mute_ads: bool,
    pub skip_ads: bool,
    pub auto_play: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            mute_ads: false,
            skip_ads: false,
            auto_play: true,
        }
    }
}

/// Command-issuing side effects, run in the background.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteAction {
    Mute,
    Unmute,
    SkipAdThenUnmute,
    PlayVideo(String),
    SetAutoplay(bool),
    RequestNowPlaying,
}

/// What the session does in response to an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    Remote(RemoteAction),
    /// Warm the segment cache for a video
    Prefetch(String),
    /// Replace the pending skip with one derived from this sample
    ScheduleSkip(PlaybackSample),
    CancelSkip,
    SyncVolume(VolumeShadow),
    /// Tear down the current subscription
    Disconnect,
}

/// Classify one event observed at `now`.
pub fn classify(
    state: &mut SessionState,
    policy: &Policy,
    event: LoungeEvent,
    now: Instant,
) -> Vec<Reaction> {
    let mut reactions = Vec::new();

    match event {
        LoungeEvent::StateChange {
            state: player_state,
            position,
            video_id,
        } => {
            let video_id = video_id.or_else(|| state.video_id.clone());
            on_playback(state, policy, player_state, position, video_id, now, &mut reactions);
        }
        LoungeEvent::NowPlaying {
            video_id,
            position,
            state: player_state,
        } => {
            if let Some(id) = &video_id {
                state.video_id = Some(id.clone());
                reactions.push(Reaction::Prefetch(id.clone()));
            }
            on_playback(state, policy, player_state, position, video_id, now, &mut reactions);
        }
        LoungeEvent::AdStateChange {
            phase: AdPhase::Ended,
            ..
        } => {
            state.ad_state = AdState::None;
            reactions.push(Reaction::Remote(RemoteAction::Unmute));
        }
        LoungeEvent::AdStateChange {
            phase: AdPhase::Active,
            skip_enabled,
        } => on_ad_active(state, policy, skip_enabled, &mut reactions),
        LoungeEvent::AdPlaying {
            content_video_id,
            skip_enabled,
        } => {
            if let Some(id) = content_video_id {
                reactions.push(Reaction::Prefetch(id));
            }
            on_ad_active(state, policy, skip_enabled, &mut reactions);
        }
        LoungeEvent::VolumeChanged(volume) => reactions.push(Reaction::SyncVolume(volume)),
        LoungeEvent::AutoplayUpNext { video_id } => {
            if let Some(id) = video_id {
                reactions.push(Reaction::Prefetch(id));
            }
        }
        LoungeEvent::LoungeStatus { screen_clients } => {
            if let Some(client) = screen_clients
                .iter()
                .find(|client| CLIENT_BLACKLIST.contains(&client.as_str()))
            {
                debug!(client = %client, "Blacklisted client in lounge");
                reactions.push(Reaction::Disconnect);
            }
        }
        LoungeEvent::SubtitlesTrackChanged { video_id } => {
            if state.shorts_disconnected {
                if let Some(id) = video_id {
                    state.shorts_disconnected = false;
                    reactions.push(Reaction::Remote(RemoteAction::PlayVideo(id)));
                }
            }
        }
        LoungeEvent::ScreenDisconnected { reason } => {
            if reason.as_deref() == Some(USER_DISCONNECT_REASON) {
                state.shorts_disconnected = true;
            }
        }
        LoungeEvent::AutoplayModeChanged { enabled } => {
            state.autoplay = enabled;
            if enabled != Some(policy.auto_play) {
                reactions.push(Reaction::Remote(RemoteAction::SetAutoplay(policy.auto_play)));
            }
        }
        LoungeEvent::PlaybackSpeedChanged { speed } => {
            if let Some(speed) = speed {
                state.playback_speed = speed;
            }
            reactions.push(Reaction::Remote(RemoteAction::RequestNowPlaying));
        }
        LoungeEvent::Other(_) => {}
    }

    reactions
}

fn on_playback(
    state: &mut SessionState,
    policy: &Policy,
    player_state: PlayerState,
    position: Option<f64>,
    video_id: Option<String>,
    now: Instant,
    reactions: &mut Vec<Reaction>,
) {
    state.player_state = player_state;

    if policy.mute_ads && player_state.is_playing() && state.ad_state.is_active() {
        state.ad_state = AdState::None;
        reactions.push(Reaction::Remote(RemoteAction::Unmute));
    }

    match (player_state.is_playing(), video_id, position) {
        (true, Some(video_id), Some(position)) => {
            let sample = PlaybackSample::observed(video_id, position, now);
            state.last_sample = Some(sample.clone());
            reactions.push(Reaction::ScheduleSkip(sample));
        }
        _ => reactions.push(Reaction::CancelSkip),
    }
}

fn on_ad_active(
    state: &mut SessionState,
    policy: &Policy,
    skip_enabled: bool,
    reactions: &mut Vec<Reaction>,
) {
    state.ad_state = if skip_enabled {
        AdState::Skippable
    } else {
        AdState::Playing
    };

    if policy.skip_ads && skip_enabled {
        reactions.push(Reaction::Remote(RemoteAction::SkipAdThenUnmute));
    } else if policy.mute_ads {
        reactions.push(Reaction::Remote(RemoteAction::Mute));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn policy(mute_ads: bool, skip_ads: bool) -> Policy {
        Policy {
            mute_ads,
            skip_ads,
            auto_play: true,
        }
    }

    fn run(state: &mut SessionState, policy: Policy, event: LoungeEvent) -> Vec<Reaction> {
        classify(state, &policy, event, Instant::now())
    }

    #[tokio::test]
    async fn test_now_playing_prefetches_and_schedules() {
        let mut state = SessionState::default();
        let reactions = run(
            &mut state,
            Policy::default(),
            LoungeEvent::NowPlaying {
                video_id: Some("vid".to_string()),
                position: Some(3.0),
                state: PlayerState::Playing,
            },
        );

        assert_eq!(reactions[0], Reaction::Prefetch("vid".to_string()));
        assert!(matches!(
            &reactions[1],
            Reaction::ScheduleSkip(sample) if sample.video_id == "vid" && sample.position == 3.0
        ));
        assert_eq!(state.video_id.as_deref(), Some("vid"));
    }

    #[tokio::test]
    async fn test_state_change_uses_current_video() {
        let mut state = SessionState {
            video_id: Some("vid".to_string()),
            ..Default::default()
        };

        let reactions = run(
            &mut state,
            Policy::default(),
            LoungeEvent::StateChange {
                state: PlayerState::Playing,
                position: Some(10.0),
                video_id: None,
            },
        );
        assert!(matches!(&reactions[..], [Reaction::ScheduleSkip(s)] if s.video_id == "vid"));

        let reactions = run(
            &mut state,
            Policy::default(),
            LoungeEvent::StateChange {
                state: PlayerState::Paused,
                position: Some(11.0),
                video_id: None,
            },
        );
        assert_eq!(reactions, vec![Reaction::CancelSkip]);
    }

    #[tokio::test]
    async fn test_playing_after_ad_unmutes_only_in_ad_context() {
        let event = || LoungeEvent::StateChange {
            state: PlayerState::Playing,
            position: None,
            video_id: None,
        };

        let mut state = SessionState::default();
        assert_eq!(run(&mut state, policy(true, false), event()), vec![Reaction::CancelSkip]);

        state.ad_state = AdState::Playing;
        let reactions = run(&mut state, policy(true, false), event());
        assert_eq!(reactions[0], Reaction::Remote(RemoteAction::Unmute));
        assert_eq!(state.ad_state, AdState::None);
    }

    #[rstest]
    #[case::skip_allowed(policy(true, true), true, Some(RemoteAction::SkipAdThenUnmute), AdState::Skippable)]
    #[case::skip_disabled_by_policy(policy(true, false), true, Some(RemoteAction::Mute), AdState::Skippable)]
    #[case::not_skippable(policy(true, true), false, Some(RemoteAction::Mute), AdState::Playing)]
    #[case::no_policy(policy(false, false), true, None, AdState::Skippable)]
    #[tokio::test]
    async fn test_ad_started(
        #[case] policy: Policy,
        #[case] skip_enabled: bool,
        #[case] expected: Option<RemoteAction>,
        #[case] ad_state: AdState,
    ) {
        let mut state = SessionState::default();
        let reactions = run(
            &mut state,
            policy,
            LoungeEvent::AdStateChange {
                phase: AdPhase::Active,
                skip_enabled,
            },
        );

        assert_eq!(reactions, expected.into_iter().map(Reaction::Remote).collect::<Vec<_>>());
        assert_eq!(state.ad_state, ad_state);
    }

    #[tokio::test]
    async fn test_ad_ended_unmutes() {
        let mut state = SessionState {
            ad_state: AdState::Playing,
            ..Default::default()
        };
        let reactions = run(
            &mut state,
            policy(true, false),
            LoungeEvent::AdStateChange {
                phase: AdPhase::Ended,
                skip_enabled: false,
            },
        );
        assert_eq!(reactions, vec![Reaction::Remote(RemoteAction::Unmute)]);
        assert_eq!(state.ad_state, AdState::None);
    }

    #[tokio::test]
    async fn test_ad_playing_prefetches_content() {
        let mut state = SessionState::default();
        let reactions = run(
            &mut state,
            policy(true, false),
            LoungeEvent::AdPlaying {
                content_video_id: Some("next".to_string()),
                skip_enabled: false,
            },
        );
        assert_eq!(
            reactions,
            vec![
                Reaction::Prefetch("next".to_string()),
                Reaction::Remote(RemoteAction::Mute),
            ]
        );
    }

    #[tokio::test]
    async fn test_blacklisted_client_disconnects() {
        let mut state = SessionState::default();
        let reactions = run(
            &mut state,
            Policy::default(),
            LoungeEvent::LoungeStatus {
                screen_clients: vec!["TVHTML5".to_string(), "TVHTML5_FOR_KIDS".to_string()],
            },
        );
        assert_eq!(reactions, vec![Reaction::Disconnect]);

        let reactions = run(
            &mut state,
            Policy::default(),
            LoungeEvent::LoungeStatus {
                screen_clients: vec!["TVHTML5".to_string()],
            },
        );
        assert!(reactions.is_empty());
    }

    #[tokio::test]
    async fn test_shorts_recovery() {
        let mut state = SessionState::default();

        let reactions = run(
            &mut state,
            Policy::default(),
            LoungeEvent::SubtitlesTrackChanged {
                video_id: Some("short".to_string()),
            },
        );
        assert!(reactions.is_empty());

        run(
            &mut state,
            Policy::default(),
            LoungeEvent::ScreenDisconnected {
                reason: Some(USER_DISCONNECT_REASON.to_string()),
            },
        );
        assert!(state.shorts_disconnected);

        let reactions = run(
            &mut state,
            Policy::default(),
            LoungeEvent::SubtitlesTrackChanged {
                video_id: Some("short".to_string()),
            },
        );
        assert_eq!(
            reactions,
            vec![Reaction::Remote(RemoteAction::PlayVideo("short".to_string()))]
        );
        assert!(!state.shorts_disconnected);
    }

    #[tokio::test]
    async fn test_autoplay_reasserted_only_on_mismatch() {
        let mut state = SessionState::default();
        let policy = Policy {
            auto_play: false,
            ..Policy::default()
        };

        let reactions = run(
            &mut state,
            policy,
            LoungeEvent::AutoplayModeChanged {
                enabled: Some(true),
            },
        );
        assert_eq!(
            reactions,
            vec![Reaction::Remote(RemoteAction::SetAutoplay(false))]
        );

        let reactions = run(
            &mut state,
            policy,
            LoungeEvent::AutoplayModeChanged {
                enabled: Some(false),
            },
        );
        assert!(reactions.is_empty());
    }

    #[tokio::test]
    async fn test_speed_change_requests_now_playing() {
        let mut state = SessionState::default();
        let reactions = run(
            &mut state,
            Policy::default(),
            LoungeEvent::PlaybackSpeedChanged { speed: Some(1.5) },
        );
        assert_eq!(
            reactions,
            vec![Reaction::Remote(RemoteAction::RequestNowPlaying)]
        );
        assert_eq!(state.playback_speed, 1.5);
    }
}
