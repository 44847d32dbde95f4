//! Per-device remote sessions.
//!
//! - [`events`] decodes raw lounge events into [`LoungeEvent`]
//! - [`classifier`] turns events into [`Reaction`]s
//! - [`remote`] serializes commands to one screen
//! - [`machine`] owns the subscription lifecycle

pub mod classifier;
pub mod events;
pub mod machine;
pub mod remote;
pub mod state;

pub use classifier::{CLIENT_BLACKLIST, Policy, Reaction, RemoteAction, classify};
pub use events::{AdPhase, EventDecodeError, LoungeEvent};
pub use machine::{
    RECONNECT_BACKOFF, SessionDeps, SessionMachine, SessionTiming, WATCHDOG_TIMEOUT,
};
pub use remote::DeviceRemote;
pub use state::{SessionPhase, SessionState};
