/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame does not start with the expected signature.
    #[error("invalid frame signature {0:#06x} (expected 0x3030)")]
    InvalidSignature(u16),

    /// The header version is not one this codec understands.
    #[error("unsupported header version {0}")]
    UnsupportedVersion(u8),

    /// The message type tag is not a known [`crate::MessageType`].
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// The length field is smaller than the smallest possible header.
    #[error("invalid message length {length} (min {min})")]
    InvalidLength { length: usize, min: usize },

    /// The encoded frame would exceed the maximum frame size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An additional header value does not fit its one-byte length field.
    #[error("additional header {header_type} too large ({size} bytes, max 255)")]
    HeaderTooLarge { header_type: u8, size: usize },

    /// Additional header type 0 is reserved for the list terminator.
    #[error("additional header type 0 is reserved")]
    ReservedHeaderType,

    /// The buffer ended before a field could be read.
    #[error("truncated frame (needed {needed} more bytes, have {have})")]
    Truncated { needed: usize, have: usize },

    /// A body writer failed while producing the payload.
    #[error("body encoding failed: {0}")]
    Encode(String),

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Wrap an arbitrary body encoding failure.
    pub fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
