use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::header::{CommonHeader, FIXED_HEADER_SIZE};

/// Frame signature (`0x3030`).
pub const SIGNATURE: u16 = 0x3030;

/// Common header version written and accepted by this codec.
pub const VERSION: u8 = 3;

/// Default maximum frame size: the largest value of the 2-byte length field.
pub const DEFAULT_MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Smallest valid frame: fixed header plus the empty additional header list.
const MIN_FRAME_SIZE: usize = FIXED_HEADER_SIZE + 2;

/// A complete frame: common header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: CommonHeader,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(header: CommonHeader, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        self.header.encoded_len() + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (big-endian):
/// ```text
/// ┌───────────┬────────┬─────┬──────┬───────┬─────┬────────┬──────────┬─────────┬─────────┬────────────────┬─────────┐
/// │ Signature │ Length │ Ver │ Type │ Flags │ Seq │ ReqId  │ FragIdx  │ SessId  │ ChanId  │ Additional     │ Payload │
/// │ 0x3030    │ (2B)   │ (1) │ (1)  │ (2B)  │ (4) │ (8B)   │ Cnt (2+2)│ (8B)    │ (8B)    │ T,L,V... 0,0   │         │
/// └───────────┴────────┴─────┴──────┴───────┴─────┴────────┴──────────┴─────────┴─────────┴────────────────┴─────────┘
/// ```
pub fn encode_frame(header: &CommonHeader, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    dst.reserve(header.encoded_len() + payload.len());
    header.write_to(payload.len(), dst)?;
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Frame>> {
    if src.len() < 4 {
        return Ok(None); // Need more data
    }

    let signature = u16::from_be_bytes([src[0], src[1]]);
    if signature != SIGNATURE {
        return Err(FrameError::InvalidSignature(signature));
    }

    let length = u16::from_be_bytes([src[2], src[3]]) as usize;
    if length < MIN_FRAME_SIZE {
        return Err(FrameError::InvalidLength {
            length,
            min: MIN_FRAME_SIZE,
        });
    }
    if length > config.max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: length,
            max: config.max_frame_size,
        });
    }

    if src.len() < length {
        return Ok(None); // Need more data
    }

    let mut bytes = src.split_to(length).freeze();
    let (header, _) = CommonHeader::read_from(&mut bytes)?;

    Ok(Some(Frame {
        header,
        payload: bytes,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted frame size in bytes. Default: 65535.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{AdditionalHeader, AdditionalHeaderType, MessageType};

    #[test]
    fn test_encode_decode_roundtrip() {
        let header = CommonHeader::session(
            7,
            vec![AdditionalHeader::new(AdditionalHeaderType::CORRELATION_VECTOR, "cv")],
        );
        let mut buf = BytesMut::new();
        encode_frame(&header, b"hello, channel!", &mut buf).unwrap();
        assert_eq!(buf.len(), header.encoded_len() + 15);

        let frame = decode_frame(&mut buf, &FrameConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(frame.header.channel_id, 7);
        assert_eq!(frame.header.message_type, MessageType::Session);
        assert_eq!(frame.header.additional_headers, header.additional_headers);
        assert_eq!(frame.payload.as_ref(), b"hello, channel!");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x30, 0x30, 0x00][..]);
        let result = decode_frame(&mut buf, &FrameConfig::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        let header = CommonHeader::session(1, Vec::new());
        encode_frame(&header, b"hello", &mut buf).unwrap();
        buf.truncate(header.encoded_len() + 2);

        let result = decode_frame(&mut buf, &FrameConfig::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_invalid_signature() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x00, 0x2A][..]);
        let result = decode_frame(&mut buf, &FrameConfig::default());
        assert!(matches!(result, Err(FrameError::InvalidSignature(0xFFFF))));
    }

    #[test]
    fn test_decode_length_below_minimum() {
        let mut buf = BytesMut::new();
        buf.put_u16(SIGNATURE);
        buf.put_u16(10);
        let result = decode_frame(&mut buf, &FrameConfig::default());
        assert!(matches!(result, Err(FrameError::InvalidLength { length: 10, .. })));
    }

    #[test]
    fn test_decode_frame_too_large() {
        let mut buf = BytesMut::new();
        encode_frame(&CommonHeader::session(1, Vec::new()), &[0u8; 128], &mut buf).unwrap();

        let cfg = FrameConfig { max_frame_size: 64 };
        let result = decode_frame(&mut buf, &cfg);
        assert!(matches!(result, Err(FrameError::FrameTooLarge { max: 64, .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(&CommonHeader::session(1, Vec::new()), b"first", &mut buf).unwrap();
        encode_frame(&CommonHeader::session(2, Vec::new()), b"second", &mut buf).unwrap();

        let cfg = FrameConfig::default();
        let f1 = decode_frame(&mut buf, &cfg).unwrap().unwrap();
        assert_eq!(f1.header.channel_id, 1);
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, &cfg).unwrap().unwrap();
        assert_eq!(f2.header.channel_id, 2);
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(&CommonHeader::default(), b"", &mut buf).unwrap();

        let frame = decode_frame(&mut buf, &FrameConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(frame.header.channel_id, 0);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::new(CommonHeader::session(1, Vec::new()), Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(), MIN_FRAME_SIZE + 4);
    }
}
