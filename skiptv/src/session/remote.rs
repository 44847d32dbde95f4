//! Serialized command issuance for one screen.

use std::sync::Arc;

use lounge_client::{Command, LoungeTransport};
use parking_lot::Mutex;
use tracing::debug;

use super::classifier::RemoteAction;
use crate::domain::VolumeShadow;
use crate::error::Result;

/// Command gate for one screen.
///
/// Every command goes through a single async lock so concurrently
/// triggered mute, unmute and seek requests reach the screen one at a time.
/// The volume shadow is read and updated under the same lock.
pub struct DeviceRemote {
    transport: Arc<dyn LoungeTransport>,
    screen_id: String,
    gate: tokio::sync::Mutex<()>,
    volume: Mutex<VolumeShadow>,
}

impl DeviceRemote {
    pub fn new(transport: Arc<dyn LoungeTransport>, screen_id: impl Into<String>) -> Self {
        Self {
            transport,
            screen_id: screen_id.into(),
            gate: tokio::sync::Mutex::new(()),
            volume: Mutex::new(VolumeShadow::default()),
        }
    }

    /// Last known volume state.
    pub fn volume(&self) -> VolumeShadow {
        *self.volume.lock()
    }

    /// Record a volume report from the screen.
    pub fn sync_volume(&self, shadow: VolumeShadow) {
        *self.volume.lock() = shadow;
    }

    /// Send a single command.
    pub async fn send(&self, command: Command) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.send_locked(&command).await
    }

    /// Mute or unmute. Returns `false` when the shadow already matched and
    /// no command was sent.
    pub async fn set_muted(&self, muted: bool) -> Result<bool> {
        let _gate = self.gate.lock().await;
        self.set_muted_locked(muted).await
    }

    /// Skip the current ad, then unmute, without another command in between.
    pub async fn skip_ad_then_unmute(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.send_locked(&Command::SkipAd).await?;
        self.set_muted_locked(false).await?;
        Ok(())
    }

    /// Carry out a classified action.
    pub async fn execute(&self, action: &RemoteAction) -> Result<()> {
        match action {
            RemoteAction::Mute => self.set_muted(true).await.map(|_| ()),
            RemoteAction::Unmute => self.set_muted(false).await.map(|_| ()),
            RemoteAction::SkipAdThenUnmute => self.skip_ad_then_unmute().await,
            RemoteAction::PlayVideo(video_id) => {
                self.send(Command::SetPlaylist {
                    video_id: video_id.clone(),
                })
                .await
            }
            RemoteAction::SetAutoplay(enabled) => {
                self.send(Command::SetAutoplayMode { enabled: *enabled })
                    .await
            }
            RemoteAction::RequestNowPlaying => self.send(Command::GetNowPlaying).await,
        }
    }

    async fn set_muted_locked(&self, muted: bool) -> Result<bool> {
        let shadow = self.volume();
        if shadow.muted == muted {
            debug!(screen_id = %self.screen_id, muted, "Volume already in requested state");
            return Ok(false);
        }

        self.send_locked(&Command::SetVolume {
            volume: shadow.volume,
            muted,
        })
        .await?;
        self.volume.lock().muted = muted;
        Ok(true)
    }

    async fn send_locked(&self, command: &Command) -> Result<()> {
        self.transport
            .send_command(&self.screen_id, command)
            .await?;
        Ok(())
    }
}
