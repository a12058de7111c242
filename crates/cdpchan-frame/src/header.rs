use bytes::{Buf, BufMut, Bytes};

use crate::codec::{SIGNATURE, VERSION};
use crate::error::{FrameError, Result};

/// Size of the fixed part of the common header, before additional headers.
pub const FIXED_HEADER_SIZE: usize = 40;

/// Size of the `0x00 0x00` additional header list terminator.
const TERMINATOR_SIZE: usize = 2;

/// Largest value an additional header can carry (one-byte length field).
pub const MAX_ADDITIONAL_HEADER_VALUE: usize = u8::MAX as usize;

/// Message type tag of the common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    None = 0,
    Discovery = 1,
    Connect = 2,
    Control = 3,
    /// Session-scoped message addressed to a channel.
    Session = 4,
    Ack = 5,
    ReliabilityResponse = 6,
}

impl MessageType {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::None => "none",
            MessageType::Discovery => "discovery",
            MessageType::Connect => "connect",
            MessageType::Control => "control",
            MessageType::Session => "session",
            MessageType::Ack => "ack",
            MessageType::ReliabilityResponse => "reliability-response",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => MessageType::None,
            1 => MessageType::Discovery,
            2 => MessageType::Connect,
            3 => MessageType::Control,
            4 => MessageType::Session,
            5 => MessageType::Ack,
            6 => MessageType::ReliabilityResponse,
            other => return Err(FrameError::UnknownMessageType(other)),
        })
    }
}

/// Flag bits of the common header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MessageFlags(pub u16);

impl MessageFlags {
    pub const NONE: Self = Self(0);
    /// The receiver should acknowledge this message.
    pub const SHOULD_ACK: Self = Self(0x0001);
    /// The payload is followed by an HMAC.
    pub const HAS_HMAC: Self = Self(0x0002);
    /// The payload is encrypted with the session key.
    pub const SESSION_ENCRYPTED: Self = Self(0x0004);

    /// Returns true if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets.
    pub fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Type tag of an additional header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdditionalHeaderType(pub u8);

impl AdditionalHeaderType {
    pub const REPLY_TO_ID: Self = Self(1);
    pub const CORRELATION_VECTOR: Self = Self(2);
    pub const WATERMARK_ID: Self = Self(3);
}

/// One extension entry of the common header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalHeader {
    pub header_type: AdditionalHeaderType,
    pub value: Bytes,
}

impl AdditionalHeader {
    pub fn new(header_type: AdditionalHeaderType, value: impl Into<Bytes>) -> Self {
        Self {
            header_type,
            value: value.into(),
        }
    }

    /// Reply-to header carrying the request id being answered.
    pub fn reply_to(request_id: u64) -> Self {
        Self::new(
            AdditionalHeaderType::REPLY_TO_ID,
            request_id.to_be_bytes().to_vec(),
        )
    }

    fn validate(&self) -> Result<()> {
        if self.header_type.0 == 0 {
            return Err(FrameError::ReservedHeaderType);
        }
        if self.value.len() > MAX_ADDITIONAL_HEADER_VALUE {
            return Err(FrameError::HeaderTooLarge {
                header_type: self.header_type.0,
                size: self.value.len(),
            });
        }
        Ok(())
    }
}

/// The common header that prefixes every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonHeader {
    pub message_type: MessageType,
    pub flags: MessageFlags,
    /// Stamped by the session on send.
    pub sequence_number: u32,
    pub request_id: u64,
    pub fragment_index: u16,
    pub fragment_count: u16,
    /// Stamped by the session on send.
    pub session_id: u64,
    pub channel_id: u64,
    pub additional_headers: Vec<AdditionalHeader>,
}

impl Default for CommonHeader {
    fn default() -> Self {
        Self {
            message_type: MessageType::None,
            flags: MessageFlags::NONE,
            sequence_number: 0,
            request_id: 0,
            fragment_index: 0,
            fragment_count: 1,
            session_id: 0,
            channel_id: 0,
            additional_headers: Vec::new(),
        }
    }
}

impl CommonHeader {
    /// Header for a session-scoped message on `channel_id`.
    pub fn session(channel_id: u64, additional_headers: Vec<AdditionalHeader>) -> Self {
        Self {
            message_type: MessageType::Session,
            channel_id,
            additional_headers,
            ..Self::default()
        }
    }

    /// Number of bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_SIZE
            + self
                .additional_headers
                .iter()
                .map(|h| 2 + h.value.len())
                .sum::<usize>()
            + TERMINATOR_SIZE
    }

    /// Look up the first additional header of a given type.
    pub fn additional_header(
        &self,
        header_type: AdditionalHeaderType,
    ) -> Option<&AdditionalHeader> {
        self.additional_headers
            .iter()
            .find(|h| h.header_type == header_type)
    }

    /// Write the header for a frame whose payload is `payload_len` bytes.
    ///
    /// Every field is validated before the first byte is written, so a failed
    /// call leaves `dst` untouched.
    pub fn write_to<B: BufMut>(&self, payload_len: usize, dst: &mut B) -> Result<()> {
        for header in &self.additional_headers {
            header.validate()?;
        }
        let total = self.encoded_len() + payload_len;
        if total > u16::MAX as usize {
            return Err(FrameError::FrameTooLarge {
                size: total,
                max: u16::MAX as usize,
            });
        }

        dst.put_u16(SIGNATURE);
        dst.put_u16(total as u16);
        dst.put_u8(VERSION);
        dst.put_u8(self.message_type as u8);
        dst.put_u16(self.flags.0);
        dst.put_u32(self.sequence_number);
        dst.put_u64(self.request_id);
        dst.put_u16(self.fragment_index);
        dst.put_u16(self.fragment_count);
        dst.put_u64(self.session_id);
        dst.put_u64(self.channel_id);
        for header in &self.additional_headers {
            dst.put_u8(header.header_type.0);
            dst.put_u8(header.value.len() as u8);
            dst.put_slice(&header.value);
        }
        dst.put_u8(0);
        dst.put_u8(0);
        Ok(())
    }

    /// Read a header, returning it together with the total message length
    /// announced by its length field.
    pub fn read_from(src: &mut Bytes) -> Result<(Self, usize)> {
        ensure(src, FIXED_HEADER_SIZE)?;

        let signature = src.get_u16();
        if signature != SIGNATURE {
            return Err(FrameError::InvalidSignature(signature));
        }
        let message_length = src.get_u16() as usize;
        let version = src.get_u8();
        if version != VERSION {
            return Err(FrameError::UnsupportedVersion(version));
        }
        let message_type = MessageType::try_from(src.get_u8())?;
        let flags = MessageFlags(src.get_u16());
        let sequence_number = src.get_u32();
        let request_id = src.get_u64();
        let fragment_index = src.get_u16();
        let fragment_count = src.get_u16();
        let session_id = src.get_u64();
        let channel_id = src.get_u64();

        let mut additional_headers = Vec::new();
        loop {
            ensure(src, 2)?;
            let header_type = src.get_u8();
            let len = src.get_u8() as usize;
            if header_type == 0 {
                // Terminator; a non-zero length here would be padding we skip.
                ensure(src, len)?;
                src.advance(len);
                break;
            }
            ensure(src, len)?;
            let value = src.split_to(len);
            additional_headers.push(AdditionalHeader {
                header_type: AdditionalHeaderType(header_type),
                value,
            });
        }

        Ok((
            Self {
                message_type,
                flags,
                sequence_number,
                request_id,
                fragment_index,
                fragment_count,
                session_id,
                channel_id,
                additional_headers,
            },
            message_length,
        ))
    }
}

fn ensure(src: &Bytes, needed: usize) -> Result<()> {
    if src.remaining() < needed {
        return Err(FrameError::Truncated {
            needed,
            have: src.remaining(),
        });
    }
    Ok(())
}
