use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{write_all_retrying, Transport};

/// A [`Transport`] over any `Write` stream.
///
/// The writer sits behind a mutex held for the whole of each `send`, which is
/// what makes every buffer land on the stream in one piece. Closing flushes
/// and drops the writer.
pub struct StreamTransport<W> {
    inner: Mutex<Option<W>>,
}

impl<W: Write + Send> StreamTransport<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(Some(inner)),
        }
    }

    /// Close the transport and hand back the writer, if it was still open.
    pub fn into_inner(self) -> Option<W> {
        match self.inner.into_inner() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<W>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> Transport for StreamTransport<W> {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let mut guard = self.lock();
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        write_all_retrying(writer, frame)?;
        debug!(bytes = frame.len(), "wrote frame buffer");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let taken = self.lock().take();
        if let Some(mut writer) = taken {
            debug!("closing stream transport");
            writer.flush()?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn name(&self) -> &'static str {
        "stream"
    }
}

impl<W> std::fmt::Debug for StreamTransport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport").finish_non_exhaustive()
    }
}
