use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{write_all_retrying, Transport};

/// A [`Transport`] over a connected Unix stream socket.
///
/// Closing shuts both directions of the socket down, which also wakes any
/// reader blocked on a clone obtained through [`SocketTransport::try_clone_reader`].
#[derive(Debug)]
pub struct SocketTransport {
    stream: Mutex<UnixStream>,
    closed: AtomicBool,
}

impl SocketTransport {
    /// Wrap an already connected stream.
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }

    /// Create a connected loopback pair.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::new(left), Self::new(right)))
    }

    /// Clone the underlying socket for use by a receive loop.
    pub fn try_clone_reader(&self) -> Result<UnixStream> {
        let stream = self.stream.lock().unwrap_or_else(|p| p.into_inner());
        Ok(stream.try_clone()?)
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let stream = self.stream.lock().unwrap_or_else(|p| p.into_inner());
        stream.set_write_timeout(timeout).map_err(Into::into)
    }
}

impl Transport for SocketTransport {
    fn send(&self, frame: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut stream = self.stream.lock().unwrap_or_else(|p| p.into_inner());
        write_all_retrying(&mut *stream, frame)?;
        debug!(bytes = frame.len(), "wrote frame buffer to socket");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let stream = self.stream.lock().unwrap_or_else(|p| p.into_inner());
        match stream.shutdown(Shutdown::Both) {
            Ok(()) => {}
            // The peer may already have torn the connection down.
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => {}
            Err(err) => return Err(err.into()),
        }
        info!("socket transport closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn name(&self) -> &'static str {
        "unix-socket"
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn pair_carries_bytes() {
        let (left, right) = SocketTransport::pair().unwrap();
        let mut reader = right.try_clone_reader().unwrap();

        left.send(b"hello").unwrap();

        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn close_wakes_reader_with_eof() {
        let (left, right) = SocketTransport::pair().unwrap();
        let mut reader = right.try_clone_reader().unwrap();

        left.close().unwrap();
        assert!(left.is_closed());

        let mut buf = [0u8; 1];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn send_after_close_is_rejected() {
        let (left, _right) = SocketTransport::pair().unwrap();
        left.close().unwrap();
        left.close().unwrap();
        assert!(matches!(left.send(b"x"), Err(TransportError::Closed)));
    }
}
