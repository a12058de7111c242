use bytes::{Buf, BufMut, Bytes};

use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::header::CommonHeader;

/// Sub-header at the start of every session message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinaryMsgHeader {
    pub message_id: u32,
}

impl BinaryMsgHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 4;

    pub fn new(message_id: u32) -> Self {
        Self { message_id }
    }

    pub fn write_to<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32(self.message_id);
    }

    pub fn read_from<B: Buf>(src: &mut B) -> Result<Self> {
        if src.remaining() < Self::SIZE {
            return Err(FrameError::Truncated {
                needed: Self::SIZE,
                have: src.remaining(),
            });
        }
        Ok(Self {
            message_id: src.get_u32(),
        })
    }
}

/// An inbound message: a header plus its (reassembled) body.
///
/// The body is a `Bytes` handle, so [`Message::body`] hands out independent
/// read cursors without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: CommonHeader,
    body: Bytes,
}

impl Message {
    pub fn new(header: CommonHeader, body: impl Into<Bytes>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }

    /// Channel this message is addressed to.
    pub fn channel_id(&self) -> u64 {
        self.header.channel_id
    }

    /// A fresh read cursor over the whole body.
    pub fn body(&self) -> Bytes {
        self.body.clone()
    }

    /// Split the body into its binary sub-header and the remaining payload.
    pub fn read_binary(&self) -> Result<(BinaryMsgHeader, Bytes)> {
        let mut cursor = self.body();
        let sub_header = BinaryMsgHeader::read_from(&mut cursor)?;
        Ok((sub_header, cursor))
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        Self::new(frame.header, frame.payload)
    }
}
