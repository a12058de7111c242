//! Multiplexed channels over a shared session transport.
//!
//! cdpchan lets many independent channels share one byte-stream connection.
//! Each channel frames its messages with the session common header and hands
//! them to the owning session, which serializes them onto the transport.
//!
//! # Crate Structure
//!
//! - [`transport`]: shared transport contract plus stream and Unix socket adapters
//! - [`frame`]: common header, additional headers, binary message sub-header, frame reader
//! - [`session`]: sessions, channels, message handlers

/// Re-export transport types.
pub mod transport {
    pub use cdpchan_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use cdpchan_frame::*;
}

/// Re-export session and channel types.
pub mod session {
    pub use cdpchan_session::*;
}

pub use cdpchan_session::{Channel, MessageHandler, Session, SessionConfig, SessionError};
