use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use cdpchan_frame::{
    encode_frame, CommonHeader, Frame, FrameError, Message, DEFAULT_MAX_FRAME_SIZE,
};
use cdpchan_transport::Transport;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::error::{Result, SessionError};
use crate::handler::MessageHandler;
use crate::reassembly::Reassembler;

/// Default body bytes carried per fragment: 16 KiB.
pub const DEFAULT_MAX_FRAGMENT_PAYLOAD: usize = 16 * 1024;

/// Default cap on bytes buffered for partially received messages: 16 MiB.
pub const DEFAULT_MAX_REASSEMBLY_BYTES: usize = 16 * 1024 * 1024;

/// Session behavior configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session id stamped into every outbound header.
    pub session_id: u64,
    /// Id given to the first channel; later channels count up from here.
    pub first_channel_id: u64,
    /// Maximum body bytes per outbound frame before fragmenting. Fragments
    /// are further capped so that header plus body fits the 16-bit length
    /// field.
    pub max_fragment_payload: usize,
    /// Maximum bytes held for incomplete inbound messages.
    pub max_reassembly_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: 0,
            first_channel_id: 1,
            max_fragment_payload: DEFAULT_MAX_FRAGMENT_PAYLOAD,
            max_reassembly_bytes: DEFAULT_MAX_REASSEMBLY_BYTES,
        }
    }
}

/// Owner of a set of channels and the single serializer of their frames.
///
/// Sessions are always handled through an `Arc`; channels keep a weak
/// reference back to theirs.
pub struct Session {
    config: SessionConfig,
    next_channel_id: AtomicU64,
    sequence: AtomicU32,
    channels: Mutex<BTreeMap<u64, Arc<Channel>>>,
    reassembly: Mutex<Reassembler>,
    disposed: AtomicBool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Arc<Self> {
        info!(session_id = config.session_id, "session created");
        Arc::new(Self {
            next_channel_id: AtomicU64::new(config.first_channel_id),
            sequence: AtomicU32::new(0),
            channels: Mutex::new(BTreeMap::new()),
            reassembly: Mutex::new(Reassembler::new(config.max_reassembly_bytes)),
            disposed: AtomicBool::new(false),
            config,
        })
    }

    pub fn id(&self) -> u64 {
        self.config.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn registry(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<Channel>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve a fresh id and register a channel bound to `handler` and
    /// `transport`.
    ///
    /// Ids come from a monotonic counter and are never handed out twice,
    /// even after the channel holding one is unregistered.
    pub fn create_channel(
        self: &Arc<Self>,
        handler: Arc<dyn MessageHandler>,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Channel>> {
        if self.is_disposed() {
            return Err(SessionError::SessionDisposed);
        }

        let id = self
            .next_channel_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |id| id.checked_add(1))
            .map_err(|_| SessionError::ChannelIdsExhausted)?;

        let channel = Arc::new(Channel::create(
            Arc::downgrade(self),
            id,
            handler,
            transport,
        ));

        let mut registry = self.registry();
        // Checked under the registry lock so dispose cannot miss this channel.
        if self.is_disposed() {
            return Err(SessionError::SessionDisposed);
        }
        registry.insert(id, Arc::clone(&channel));
        drop(registry);

        info!(
            session_id = self.id(),
            channel_id = id,
            transport = channel.transport().name(),
            "channel registered"
        );
        Ok(channel)
    }

    /// Remove a channel from the registry.
    ///
    /// Unknown ids are ignored. Returns whether a channel was removed.
    pub fn unregister(&self, channel_id: u64) -> bool {
        let removed = self.registry().remove(&channel_id).is_some();
        if removed {
            debug!(session_id = self.id(), channel_id, "channel unregistered");
        }
        removed
    }

    /// Look up a registered channel.
    pub fn channel(&self, channel_id: u64) -> Option<Arc<Channel>> {
        self.registry().get(&channel_id).cloned()
    }

    pub fn channel_count(&self) -> usize {
        self.registry().len()
    }

    /// Registered channel ids in ascending order.
    pub fn channel_ids(&self) -> Vec<u64> {
        self.registry().keys().copied().collect()
    }

    /// Serialize one message and write it to `transport` atomically.
    ///
    /// `body_writer` runs once against an empty buffer. The session stamps
    /// its id and the next sequence number into `header`, splits the body
    /// into fragments of at most `max_fragment_payload` bytes (less if the
    /// header would push a frame past the maximum frame size), and writes
    /// every fragment with a single [`Transport::send`] call so frames from
    /// concurrent senders cannot interleave.
    pub fn send<F>(
        &self,
        transport: &dyn Transport,
        mut header: CommonHeader,
        body_writer: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut BytesMut) -> cdpchan_frame::Result<()>,
    {
        if self.is_disposed() {
            return Err(SessionError::SessionDisposed);
        }

        let mut body = BytesMut::new();
        body_writer(&mut body)?;

        let room = DEFAULT_MAX_FRAME_SIZE.saturating_sub(header.encoded_len());
        let chunk = self.config.max_fragment_payload.min(room).max(1);
        let count = body.len().div_ceil(chunk).max(1);
        let fragment_count = u16::try_from(count).map_err(|_| FrameError::FrameTooLarge {
            size: body.len(),
            max: chunk * u16::MAX as usize,
        })?;

        header.session_id = self.config.session_id;
        header.sequence_number = self.sequence.fetch_add(1, Ordering::Relaxed);
        header.fragment_count = fragment_count;

        let mut out = BytesMut::with_capacity(body.len() + count * header.encoded_len());
        if body.is_empty() {
            header.fragment_index = 0;
            encode_frame(&header, &[], &mut out)?;
        } else {
            for (index, piece) in body.chunks(chunk).enumerate() {
                header.fragment_index = index as u16;
                encode_frame(&header, piece, &mut out)?;
            }
        }

        transport.send(&out)?;
        debug!(
            session_id = self.config.session_id,
            channel_id = header.channel_id,
            sequence = header.sequence_number,
            fragments = fragment_count,
            bytes = out.len(),
            "wrote message"
        );
        Ok(())
    }

    /// Inbound path: collect fragments, then route the complete message.
    pub fn receive(&self, frame: Frame) -> Result<()> {
        if self.is_disposed() {
            return Err(SessionError::SessionDisposed);
        }

        let message = if frame.header.fragment_count > 1 {
            let mut reassembly = self
                .reassembly
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match reassembly.push(frame)? {
                Some(message) => message,
                None => return Ok(()),
            }
        } else {
            Message::from(frame)
        };

        self.dispatch(&message)
    }

    /// Hand a complete message to the channel it is addressed to.
    pub fn dispatch(&self, message: &Message) -> Result<()> {
        let channel_id = message.channel_id();
        let Some(channel) = self.channel(channel_id) else {
            warn!(session_id = self.id(), channel_id, "message for unknown channel");
            return Err(SessionError::UnknownChannel(channel_id));
        };
        channel.deliver(message)
    }

    /// Tear the session down, disposing every registered channel.
    ///
    /// Idempotent. Transports are left open; close them through
    /// [`Channel::dispose`] or directly.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let channels: Vec<Arc<Channel>> = {
            let mut registry = self.registry();
            std::mem::take(&mut *registry).into_values().collect()
        };
        info!(
            session_id = self.id(),
            channels = channels.len(),
            "disposing session"
        );

        for channel in channels {
            if let Err(err) = channel.dispose(false, false) {
                warn!(channel_id = channel.id(), error = %err, "channel dispose failed");
            }
        }

        self.reassembly
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.config.session_id)
            .field("channels", &self.channel_ids())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
