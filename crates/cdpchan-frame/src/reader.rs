use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Bytes requested from the stream per read call.
const READ_SIZE: usize = 8 * 1024;

/// Blocking frame source over any `Read` stream.
///
/// Bytes are buffered until a whole frame is available, so short reads from
/// sockets or pipes are invisible to callers. Used by receive loops that feed
/// `Session::receive`.
///
/// As an [`Iterator`] the reader is fused: after the first error, including a
/// truncated trailing frame, it yields `None`.
pub struct FrameReader<R> {
    stream: R,
    pending: BytesMut,
    scratch: Box<[u8]>,
    config: FrameConfig,
    failed: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self::with_config(stream, FrameConfig::default())
    }

    pub fn with_config(stream: R, config: FrameConfig) -> Self {
        Self {
            stream,
            pending: BytesMut::new(),
            scratch: vec![0u8; READ_SIZE].into_boxed_slice(),
            config,
            failed: false,
        }
    }

    /// Block until the next frame has arrived.
    ///
    /// End of stream, whether between frames or inside one, is
    /// [`FrameError::ConnectionClosed`].
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match decode_frame(&mut self.pending, &self.config) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(err) => {
                    debug!(error = %err, buffered = self.pending.len(), "rejecting frame");
                    return Err(err);
                }
            }
            if self.fill()? == 0 {
                if !self.pending.is_empty() {
                    debug!(buffered = self.pending.len(), "stream ended inside a frame");
                }
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// One read from the stream; returns the number of bytes added.
    fn fill(&mut self) -> Result<usize> {
        loop {
            match self.stream.read(&mut self.scratch) {
                Ok(n) => {
                    self.pending.extend_from_slice(&self.scratch[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.stream
    }

    /// Give back the stream. Buffered bytes of an unfinished frame are lost.
    pub fn into_inner(self) -> R {
        self.stream
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    /// Ends on end of stream at a frame boundary; a truncated trailing frame
    /// or a rejected frame is reported once, then iteration stops.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_frame() {
            Err(FrameError::ConnectionClosed) if self.pending.is_empty() => None,
            Ok(frame) => Some(Ok(frame)),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
