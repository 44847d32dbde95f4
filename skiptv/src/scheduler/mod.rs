//! Skip scheduling.
//!
//! A skip is planned from the latest playback sample: find the next segment
//! boundary, wait until the screen should reach it, then seek past it. Each
//! device has at most one pending skip; scheduling a new one cancels the
//! previous.

mod plan;

pub use plan::{SkipPlan, compute_delay, plan_skip};

use std::sync::Arc;

use lounge_client::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::domain::{Device, PlaybackSample};
use crate::providers::ViewTracker;
use crate::segments::SegmentResolver;
use crate::session::DeviceRemote;

/// Parameters for creating a scheduler.
pub struct SchedulerParams {
    pub device: Device,
    pub remote: Arc<DeviceRemote>,
    pub resolver: Arc<SegmentResolver>,
    /// `None` disables view tracking
    pub view_tracker: Option<Arc<dyn ViewTracker>>,
    pub tracker: TaskTracker,
    pub cancel_token: CancellationToken,
}

/// Everything a skip task needs, shared across skips.
struct SkipContext {
    device: Device,
    remote: Arc<DeviceRemote>,
    resolver: Arc<SegmentResolver>,
    view_tracker: Option<Arc<dyn ViewTracker>>,
    tracker: TaskTracker,
    cancel_token: CancellationToken,
}

struct PendingSkip {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Single-flight skip scheduler for one device.
pub struct SkipScheduler {
    ctx: Arc<SkipContext>,
    pending: Option<PendingSkip>,
}

impl SkipScheduler {
    pub fn new(params: SchedulerParams) -> Self {
        let SchedulerParams {
            device,
            remote,
            resolver,
            view_tracker,
            tracker,
            cancel_token,
        } = params;

        Self {
            ctx: Arc::new(SkipContext {
                device,
                remote,
                resolver,
                view_tracker,
                tracker,
                cancel_token,
            }),
            pending: None,
        }
    }

    /// Replace any pending skip with one derived from `sample`.
    pub fn schedule(&mut self, sample: PlaybackSample) {
        self.cancel();

        let token = self.ctx.cancel_token.child_token();
        let ctx = self.ctx.clone();
        let task_token = token.clone();
        let handle = self.ctx.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    trace!(device = %ctx.device, "Pending skip cancelled");
                }
                _ = ctx.run(sample) => {}
            }
        });

        self.pending = Some(PendingSkip { token, handle });
    }

    /// Cancel the pending skip, if any.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
        }
    }

    /// Whether a skip is scheduled and has not finished.
    pub fn has_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }
}

impl Drop for SkipScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl SkipContext {
    async fn run(&self, sample: PlaybackSample) {
        let set = match self.resolver.resolve(&sample.video_id).await {
            Ok(set) => set,
            Err(e) => {
                warn!(
                    device = %self.device,
                    video_id = %sample.video_id,
                    error = %e,
                    "Failed to resolve segments, playing unskipped"
                );
                return;
            }
        };

        let Some(plan) = plan_skip(&set, sample.position) else {
            debug!(
                device = %self.device,
                video_id = %sample.video_id,
                position = sample.position,
                "No upcoming segment"
            );
            return;
        };

        let delay = compute_delay(&plan, sample.position, sample.elapsed(), self.device.offset);
        debug!(
            device = %self.device,
            video_id = %sample.video_id,
            target = plan.end,
            delay_ms = delay.as_millis() as u64,
            "Skip scheduled"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Err(e) = self
            .remote
            .send(Command::SeekTo { new_time: plan.end })
            .await
        {
            warn!(device = %self.device, error = %e, "Failed to seek past segment");
            return;
        }
        info!(
            device = %self.device,
            video_id = %sample.video_id,
            from = plan.start,
            to = plan.end,
            "Skipped segment"
        );

        self.report_viewed(plan.ids);
    }

    /// Report skipped ids in the background; outlives the skip itself.
    fn report_viewed(&self, ids: Vec<String>) {
        let Some(view_tracker) = self.view_tracker.clone() else {
            return;
        };
        let token = self.cancel_token.clone();
        let device = self.device.name.clone();

        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                result = view_tracker.report(&ids) => {
                    if let Err(e) = result {
                        warn!(device = %device, error = %e, "Failed to report viewed segments");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawSegment;
    use crate::test_support::{FakeSegmentSource, FakeTransport, RecordingViewTracker, settle};
    use std::time::Duration;

    struct Harness {
        transport: Arc<FakeTransport>,
        views: Arc<RecordingViewTracker>,
        tracker: TaskTracker,
        scheduler: SkipScheduler,
    }

    fn harness(offset: f64, segments: Vec<RawSegment>) -> Harness {
        let transport = Arc::new(FakeTransport::new());
        let source = Arc::new(FakeSegmentSource::new());
        source.insert("vid", segments);
        let views = Arc::new(RecordingViewTracker::new());
        let tracker = TaskTracker::new();

        let scheduler = SkipScheduler::new(SchedulerParams {
            device: Device::new("screen", "tv", offset),
            remote: Arc::new(DeviceRemote::new(transport.clone(), "screen")),
            resolver: Arc::new(SegmentResolver::with_source(source)),
            view_tracker: Some(views.clone()),
            tracker: tracker.clone(),
            cancel_token: CancellationToken::new(),
        });

        Harness {
            transport,
            views,
            tracker,
            scheduler,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_fires_at_segment_start() {
        let mut h = harness(0.0, vec![RawSegment::new(5.0, 8.0, "s1", true)]);
        h.scheduler.schedule(PlaybackSample::new("vid", 0.0));

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(h.transport.commands().is_empty());
        assert!(h.scheduler.has_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(h.transport.commands(), vec![Command::SeekTo { new_time: 8.0 }]);
        assert_eq!(h.views.reports(), vec![vec!["s1".to_string()]]);
        assert!(!h.scheduler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_offset_fires_early() {
        let mut h = harness(1.5, vec![RawSegment::new(5.0, 8.0, "s1", true)]);
        h.scheduler.schedule(PlaybackSample::new("vid", 0.0));

        tokio::time::sleep(Duration::from_millis(3600)).await;
        settle().await;
        assert_eq!(h.transport.commands(), vec![Command::SeekTo { new_time: 8.0 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opening_segment_fires_immediately() {
        let mut h = harness(0.0, vec![RawSegment::new(0.0, 8.0, "intro", true)]);
        h.scheduler.schedule(PlaybackSample::new("vid", 0.5));

        settle().await;
        assert_eq!(h.transport.commands(), vec![Command::SeekTo { new_time: 8.0 }]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_keeps_only_latest() {
        let mut h = harness(
            0.0,
            vec![
                RawSegment::new(5.0, 8.0, "first", true),
                RawSegment::new(10.0, 12.0, "second", true),
            ],
        );

        h.scheduler.schedule(PlaybackSample::new("vid", 0.0));
        settle().await;
        h.scheduler.schedule(PlaybackSample::new("vid", 6.0));

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(h.transport.commands(), vec![Command::SeekTo { new_time: 12.0 }]);
        assert_eq!(h.views.reports(), vec![vec!["second".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_seek() {
        let mut h = harness(0.0, vec![RawSegment::new(5.0, 8.0, "s1", true)]);
        h.scheduler.schedule(PlaybackSample::new("vid", 0.0));
        settle().await;
        h.scheduler.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        h.tracker.close();
        h.tracker.wait().await;
        assert!(h.transport.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_segment_after_position() {
        let mut h = harness(0.0, vec![RawSegment::new(5.0, 8.0, "s1", true)]);
        h.scheduler.schedule(PlaybackSample::new("vid", 30.0));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(h.transport.commands().is_empty());
    }
}
