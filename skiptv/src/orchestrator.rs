//! Runs one session per configured device.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::Device;
use crate::session::{SessionDeps, SessionMachine};

/// Owns the device sessions and their shared cancellation token.
pub struct DeviceOrchestrator {
    devices: Vec<Device>,
    deps: SessionDeps,
    cancellation_token: CancellationToken,
    started: AtomicBool,
    /// Session tasks, taken on shutdown
    tasks: parking_lot::Mutex<Option<JoinSet<()>>>,
}

impl DeviceOrchestrator {
    pub fn new(devices: Vec<Device>, deps: SessionDeps) -> Self {
        Self {
            devices,
            deps,
            cancellation_token: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: parking_lot::Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Spawn a session for every device. Calling it again has no effect.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already started");
            return;
        }

        info!(devices = self.devices.len(), "Starting device sessions");

        let mut tasks = self.tasks.lock();
        if let Some(ref mut join_set) = *tasks {
            for device in &self.devices {
                let machine = SessionMachine::new(
                    device.clone(),
                    self.deps.clone(),
                    self.cancellation_token.child_token(),
                );
                join_set.spawn(machine.run());
            }
        }
    }

    /// Cancel every session and wait for them to stop.
    pub async fn shutdown(&self) {
        info!("Stopping device sessions");
        self.cancellation_token.cancel();

        // Take the join set out of the mutex before awaiting
        let join_set = {
            let mut tasks = self.tasks.lock();
            tasks.take()
        };

        if let Some(mut join_set) = join_set {
            while let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    error!(error = %e, "Session task failed");
                }
            }
        }

        info!("Device sessions stopped");
    }

    /// Whether sessions have been started and not shut down.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancellation_token.is_cancelled()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
