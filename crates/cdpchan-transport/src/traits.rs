use std::io::{ErrorKind, Write};

use crate::error::{Result, TransportError};

/// A byte-oriented connection shared by every channel of a session.
///
/// Implementations must write each buffer passed to [`Transport::send`] as one
/// uninterrupted unit: bytes from two concurrent `send` calls never interleave.
pub trait Transport: Send + Sync {
    /// Write a complete, already-encoded buffer.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Close the connection.
    ///
    /// Closing an already closed transport is a no-op.
    fn close(&self) -> Result<()>;

    /// Whether [`Transport::close`] has been called.
    fn is_closed(&self) -> bool;

    /// Transport name for diagnostics.
    fn name(&self) -> &'static str {
        "transport"
    }
}

/// Write `buf` completely, retrying interrupted and would-block writes.
pub(crate) fn write_all_retrying<W: Write + ?Sized>(inner: &mut W, buf: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < buf.len() {
        match inner.write(&buf[offset..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }

    loop {
        match inner.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct FlakyWriter {
        failures: u8,
        kind: ErrorKind,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(std::io::Error::from(self.kind));
            }
            // Short writes exercise the offset loop.
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn zero_length_write_means_closed() {
        let err = write_all_retrying(&mut ZeroWriter, b"x").unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn retries_interrupted_and_short_writes() {
        let mut writer = FlakyWriter {
            failures: 2,
            kind: ErrorKind::Interrupted,
            data: Vec::new(),
        };
        write_all_retrying(&mut writer, b"hello world").unwrap();
        assert_eq!(writer.data, b"hello world");
    }

    #[test]
    fn propagates_hard_io_errors() {
        let mut writer = FlakyWriter {
            failures: 1,
            kind: ErrorKind::BrokenPipe,
            data: Vec::new(),
        };
        let err = write_all_retrying(&mut writer, b"x").unwrap_err();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }
}
