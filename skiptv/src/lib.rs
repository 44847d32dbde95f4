//! Segment skipping and ad handling for YouTube TV screens.
//!
//! Each configured screen gets a long-lived lounge session. Playback events
//! drive a skip scheduler that seeks past crowd-sourced segments, and ad
//! events mute, unmute or skip ads according to the configured policy.

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod providers;
pub mod scheduler;
pub mod segments;
pub mod session;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
pub use orchestrator::DeviceOrchestrator;
