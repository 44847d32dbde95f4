//! Client for the YouTube Lounge remote control protocol.
//!
//! A lounge session binds this process as a remote control for one screen.
//! Inbound activity arrives on a long-poll channel as named events with a
//! loosely-typed JSON payload; outbound commands are posted as form fields.
//!
//! The [`LoungeTransport`] trait is the seam consumers depend on. [`LoungeClient`]
//! implements it over HTTP.

pub mod client;
pub mod codec;
pub mod command;
pub mod error;
pub mod event;
pub mod transport;

pub use client::{LoungeClient, LoungeClientConfig};
pub use codec::LoungeCodec;
pub use command::Command;
pub use error::{LoungeError, Result};
pub use event::RawEvent;
pub use transport::{LoungeTransport, Subscription};
