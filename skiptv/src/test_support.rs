//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lounge_client::{Command, LoungeError, LoungeTransport, RawEvent, Subscription};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::RawSegment;
use crate::error::{Error, Result};
use crate::providers::{ChannelLookup, SegmentSource, ViewTracker};

/// Let spawned tasks run without advancing a paused clock.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Transport whose subscriptions are fed by the test.
#[derive(Default)]
pub struct FakeTransport {
    senders: Mutex<Vec<mpsc::Sender<RawEvent>>>,
    commands: Mutex<Vec<(String, Command)>>,
    attempts: AtomicUsize,
    fail_subscribe: AtomicBool,
    fail_commands: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `subscribe` calls, including failed ones.
    pub fn subscribe_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands
            .lock()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    /// Push an event into the newest subscription.
    pub async fn emit(&self, name: &str, payload: Value) -> bool {
        let sender = self.senders.lock().last().cloned();
        match sender {
            Some(sender) => sender.send(RawEvent::new(name, payload)).await.is_ok(),
            None => false,
        }
    }

    /// End every open subscription stream.
    pub fn end_streams(&self) {
        self.senders.lock().clear();
    }
}

#[async_trait]
impl LoungeTransport for FakeTransport {
    async fn subscribe(&self, screen_id: &str) -> lounge_client::Result<Subscription> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(LoungeError::SessionInvalidated(screen_id.to_string()));
        }
        let (tx, rx) = mpsc::channel(16);
        self.senders.lock().push(tx);
        Ok(Subscription::from_channel(rx))
    }

    async fn send_command(&self, screen_id: &str, command: &Command) -> lounge_client::Result<()> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(LoungeError::NotConnected(screen_id.to_string()));
        }
        self.commands
            .lock()
            .push((screen_id.to_string(), command.clone()));
        Ok(())
    }
}

/// Segment source backed by a map.
#[derive(Default)]
pub struct FakeSegmentSource {
    segments: Mutex<HashMap<String, Vec<RawSegment>>>,
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FakeSegmentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, video_id: &str, segments: Vec<RawSegment>) {
        self.segments.lock().insert(video_id.to_string(), segments);
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every fetch take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

#[async_trait]
impl SegmentSource for FakeSegmentSource {
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<RawSegment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::provider("fake", "unavailable"));
        }
        Ok(self
            .segments
            .lock()
            .get(video_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Channel lookup backed by a map.
#[derive(Default)]
pub struct FakeChannelLookup {
    channels: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl FakeChannelLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, video_id: &str, channel_id: &str) {
        self.channels
            .lock()
            .insert(video_id.to_string(), channel_id.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelLookup for FakeChannelLookup {
    async fn channel_of(&self, video_id: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.channels
            .lock()
            .get(video_id)
            .cloned()
            .ok_or_else(|| Error::provider("fake", format!("unknown video {video_id}")))
    }
}

/// View tracker that records every report.
#[derive(Default)]
pub struct RecordingViewTracker {
    reports: Mutex<Vec<Vec<String>>>,
}

impl RecordingViewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Vec<String>> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl ViewTracker for RecordingViewTracker {
    async fn report(&self, ids: &[String]) -> Result<()> {
        self.reports.lock().push(ids.to_vec());
        Ok(())
    }
}
