//! Subscription lifecycle for one device.
//!
//! The machine subscribes to the screen, feeds every event through the
//! classifier and carries out the resulting reactions. A silent stream is
//! torn down by the watchdog and resubscribed at once; a stream that ends
//! or fails is resubscribed after a backoff. Only cancellation stops it.

use std::sync::Arc;
use std::time::Duration;

use lounge_client::{LoungeTransport, RawEvent, Subscription};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use super::classifier::{Policy, Reaction, RemoteAction, classify};
use super::events::LoungeEvent;
use super::remote::DeviceRemote;
use super::state::{SessionPhase, SessionState};
use crate::domain::Device;
use crate::providers::ViewTracker;
use crate::scheduler::{SchedulerParams, SkipScheduler};
use crate::segments::SegmentResolver;

/// Maximum silence on a subscription before it is considered stale.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(35);

/// Wait before resubscribing after a stream ends or fails.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

/// Session timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub watchdog: Duration,
    pub backoff: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            watchdog: WATCHDOG_TIMEOUT,
            backoff: RECONNECT_BACKOFF,
        }
    }
}

/// Collaborators shared by every device session.
#[derive(Clone)]
pub struct SessionDeps {
    pub transport: Arc<dyn LoungeTransport>,
    pub resolver: Arc<SegmentResolver>,
    pub view_tracker: Option<Arc<dyn ViewTracker>>,
    pub policy: Policy,
    pub timing: SessionTiming,
}

/// Result of event handling - indicates whether to keep the subscription.
#[derive(Debug, PartialEq)]
pub(crate) enum CommandResult {
    Continue,
    Stop,
}

/// Why a subscription stopped being driven.
#[derive(Debug, PartialEq)]
enum DriveOutcome {
    /// Stream closed or failed
    Ended,
    /// No event within the watchdog timeout
    Stale,
    /// A blacklisted client joined the lounge
    Kicked,
    Cancelled,
}

/// State machine for one device's remote session.
pub struct SessionMachine {
    device: Device,
    transport: Arc<dyn LoungeTransport>,
    resolver: Arc<SegmentResolver>,
    policy: Policy,
    timing: SessionTiming,

    remote: Arc<DeviceRemote>,
    // Remote actions run one at a time in the order they were classified
    actions_tx: mpsc::UnboundedSender<RemoteAction>,
    actions_rx: Option<mpsc::UnboundedReceiver<RemoteAction>>,
    scheduler: SkipScheduler,
    state: SessionState,
    phase_tx: watch::Sender<SessionPhase>,

    // Background side effects, awaited on shutdown
    tracker: TaskTracker,
    cancel_token: CancellationToken,
}

impl SessionMachine {
    pub fn new(device: Device, deps: SessionDeps, cancel_token: CancellationToken) -> Self {
        let SessionDeps {
            transport,
            resolver,
            view_tracker,
            policy,
            timing,
        } = deps;

        let tracker = TaskTracker::new();
        let remote = Arc::new(DeviceRemote::new(
            transport.clone(),
            device.screen_id.clone(),
        ));
        let scheduler = SkipScheduler::new(SchedulerParams {
            device: device.clone(),
            remote: remote.clone(),
            resolver: resolver.clone(),
            view_tracker,
            tracker: tracker.clone(),
            cancel_token: cancel_token.clone(),
        });
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();

        Self {
            device,
            transport,
            resolver,
            policy,
            timing,
            remote,
            actions_tx,
            actions_rx: Some(actions_rx),
            scheduler,
            state: SessionState::default(),
            phase_tx,
            tracker,
            cancel_token,
        }
    }

    /// Watch the session phase.
    pub fn phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Run until cancelled.
    pub async fn run(mut self) {
        info!(device = %self.device, "Starting session");
        if let Some(actions) = self.actions_rx.take() {
            self.spawn_action_worker(actions);
        }

        loop {
            self.set_phase(SessionPhase::Subscribing);

            let subscribed = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                result = self.transport.subscribe(&self.device.screen_id) => result,
            };

            let outcome = match subscribed {
                Ok(subscription) => {
                    self.set_phase(SessionPhase::Active);
                    info!(device = %self.device, "Subscribed to screen");
                    self.drive(subscription).await
                }
                Err(e) => {
                    warn!(device = %self.device, error = %e, "Failed to subscribe");
                    DriveOutcome::Ended
                }
            };

            match outcome {
                DriveOutcome::Cancelled => break,
                DriveOutcome::Stale => {
                    self.set_phase(SessionPhase::Stale);
                    info!(
                        device = %self.device,
                        timeout_secs = self.timing.watchdog.as_secs(),
                        "No events from screen, resubscribing"
                    );
                }
                DriveOutcome::Ended | DriveOutcome::Kicked => {
                    self.set_phase(SessionPhase::Error);
                    debug!(
                        device = %self.device,
                        backoff_secs = self.timing.backoff.as_secs(),
                        "Waiting before resubscribing"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel_token.cancelled() => break,
                        _ = tokio::time::sleep(self.timing.backoff) => {}
                    }
                }
            }
        }

        self.shutdown().await;
    }

    /// Consume one subscription until it ends, goes stale or is cancelled.
    async fn drive(&mut self, mut subscription: Subscription) -> DriveOutcome {
        let watchdog = tokio::time::sleep(self.timing.watchdog);
        tokio::pin!(watchdog);

        let outcome = loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => break DriveOutcome::Cancelled,

                _ = &mut watchdog => break DriveOutcome::Stale,

                event = subscription.next() => {
                    let Some(raw) = event else {
                        info!(device = %self.device, "Subscription ended");
                        break DriveOutcome::Ended;
                    };
                    watchdog.as_mut().reset(Instant::now() + self.timing.watchdog);
                    if self.handle_event(&raw) == CommandResult::Stop {
                        break DriveOutcome::Kicked;
                    }
                }
            }
        };

        subscription.close();
        outcome
    }

    fn handle_event(&mut self, raw: &RawEvent) -> CommandResult {
        let event = match LoungeEvent::decode(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(device = %self.device, error = %e, "Dropping malformed event");
                return CommandResult::Continue;
            }
        };
        trace!(device = %self.device, event = ?event, "Event");

        let reactions = classify(&mut self.state, &self.policy, event, Instant::now());
        let mut result = CommandResult::Continue;

        for reaction in reactions {
            match reaction {
                Reaction::Remote(action) => self.enqueue_remote(action),
                Reaction::Prefetch(video_id) => self.spawn_prefetch(video_id),
                Reaction::ScheduleSkip(sample) => self.scheduler.schedule(sample),
                Reaction::CancelSkip => self.scheduler.cancel(),
                Reaction::SyncVolume(volume) => self.remote.sync_volume(volume),
                Reaction::Disconnect => {
                    info!(device = %self.device, "Blacklisted client joined, disconnecting");
                    result = CommandResult::Stop;
                }
            }
        }

        result
    }

    fn enqueue_remote(&self, action: RemoteAction) {
        if let Err(mpsc::error::SendError(action)) = self.actions_tx.send(action) {
            debug!(device = %self.device, action = ?action, "Action worker gone, dropping action");
        }
    }

    /// Drain queued remote actions on a single task until cancelled.
    fn spawn_action_worker(&self, mut actions: mpsc::UnboundedReceiver<RemoteAction>) {
        let remote = self.remote.clone();
        let token = self.cancel_token.clone();
        let device = self.device.name.clone();

        self.tracker.spawn(async move {
            loop {
                let action = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    action = actions.recv() => match action {
                        Some(action) => action,
                        None => break,
                    },
                };

                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    result = remote.execute(&action) => {
                        if let Err(e) = result {
                            warn!(device = %device, action = ?action, error = %e, "Remote command failed");
                        }
                    }
                }
            }
            trace!(device = %device, "Action worker stopped");
        });
    }

    fn spawn_prefetch(&self, video_id: String) {
        let resolver = self.resolver.clone();
        let token = self.cancel_token.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                result = resolver.resolve(&video_id) => {
                    if let Err(e) = result {
                        debug!(video_id = %video_id, error = %e, "Prefetch failed");
                    }
                }
            }
        });
    }

    fn set_phase(&self, phase: SessionPhase) {
        let previous = self.phase_tx.send_replace(phase);
        if previous != phase {
            trace!(device = %self.device, from = %previous, to = %phase, "Session phase");
        }
    }

    async fn shutdown(&mut self) {
        self.scheduler.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        self.set_phase(SessionPhase::Stopped);
        info!(device = %self.device, "Session stopped");
    }
}
