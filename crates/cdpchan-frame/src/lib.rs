//! Session frame codec for multiplexed channels.
//!
//! Every frame on the wire is a big-endian common header followed by a
//! payload:
//! - a 2-byte signature (`0x3030`) and the 2-byte total message length
//! - version, message type, flags, sequence number and request id
//! - fragment index/count, session id and the target channel id
//! - a list of `type, length, value` additional headers ending in `0x00 0x00`
//!
//! Session messages carry a [`BinaryMsgHeader`] (the message id) at the start
//! of their payload, followed by the application body.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod header;
pub mod message;
pub mod reader;

#[cfg(feature = "async")]
pub use async_codec::CdpCodec;
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_FRAME_SIZE, SIGNATURE,
    VERSION,
};
pub use error::{FrameError, Result};
pub use header::{
    AdditionalHeader, AdditionalHeaderType, CommonHeader, MessageFlags, MessageType,
    FIXED_HEADER_SIZE, MAX_ADDITIONAL_HEADER_VALUE,
};
pub use message::{BinaryMsgHeader, Message};
pub use reader::FrameReader;
