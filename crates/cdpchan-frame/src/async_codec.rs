//! `tokio_util` codec for async receive loops.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig};
use crate::error::FrameError;

/// Frame codec for `FramedRead`/`FramedWrite`.
#[derive(Debug, Clone, Default)]
pub struct CdpCodec {
    config: FrameConfig,
}

impl CdpCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }
}

impl Decoder for CdpCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        decode_frame(src, &self.config)
    }
}

impl Encoder<Frame> for CdpCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_frame(&item.header, &item.payload, dst)
    }
}
