//! Multiplexed channels over a shared session transport.
//!
//! A [`Session`] owns a registry of [`Channel`]s that all write to shared
//! transports. Channels build session frames (common header, binary message
//! sub-header, body) and hand them to the session, which is the single point
//! where frames are serialized onto a transport. Inbound frames are
//! reassembled by the session and delivered synchronously to the channel's
//! [`MessageHandler`].

pub mod channel;
pub mod error;
mod gate;
pub mod handler;
mod reassembly;
pub mod session;

pub use channel::Channel;
pub use error::{HandlerError, Result, SessionError};
pub use handler::MessageHandler;
pub use session::{Session, SessionConfig, DEFAULT_MAX_FRAGMENT_PAYLOAD};
