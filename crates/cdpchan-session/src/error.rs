use cdpchan_frame::FrameError;
use cdpchan_transport::TransportError;

/// Error type returned by message handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in session and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The channel has been disposed (or its session is gone).
    #[error("channel {channel_id} is closed")]
    ChannelClosed { channel_id: u64 },

    /// The session has been disposed.
    #[error("session disposed")]
    SessionDisposed,

    /// No further channel ids can be assigned in this session.
    #[error("channel ids exhausted")]
    ChannelIdsExhausted,

    /// No channel with this id is registered.
    #[error("no channel registered with id {0}")]
    UnknownChannel(u64),

    /// A message was handed to a channel it is not addressed to.
    #[error("message for channel {target} delivered to channel {channel_id}")]
    Misrouted { channel_id: u64, target: u64 },

    /// Inbound fragments could not be reassembled.
    #[error("reassembly failed: {0}")]
    Reassembly(String),

    /// Transport-level error, propagated unchanged.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Header or body encoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] FrameError),

    /// The message handler failed.
    #[error("handler error: {0}")]
    Handler(#[source] HandlerError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
