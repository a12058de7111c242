//! Shared transport abstraction for multiplexed channel sessions.
//!
//! A single transport connection carries the frames of every channel in a
//! session. This crate defines the narrow contract the session layer needs
//! from that connection:
//! - write one fully-assembled frame buffer atomically
//! - close the connection on request
//!
//! Adapters are provided for any `Write` stream and for Unix stream sockets.

pub mod error;
#[cfg(unix)]
pub mod socket;
pub mod stream;
pub mod traits;

pub use error::{Result, TransportError};
#[cfg(unix)]
pub use socket::SocketTransport;
pub use stream::StreamTransport;
pub use traits::Transport;
