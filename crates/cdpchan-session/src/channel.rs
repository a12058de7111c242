use std::sync::{Arc, Weak};

use bytes::BytesMut;
use cdpchan_frame::{AdditionalHeader, BinaryMsgHeader, CommonHeader, Message};
use cdpchan_transport::Transport;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::gate::Gate;
use crate::handler::MessageHandler;
use crate::session::Session;

/// One logical endpoint multiplexed over a session's transport.
///
/// Channels are created by [`Session::create_channel`] and bind together a
/// channel id, the owning session, a transport and a handler. The session is
/// held weakly; transport and handler are shared and never torn down by the
/// channel unless [`Channel::dispose`] is explicitly asked to.
///
/// A channel is either open or closed. [`Channel::dispose`] is the only
/// transition and it is terminal.
pub struct Channel {
    id: u64,
    session: Weak<Session>,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn MessageHandler>,
    gate: Gate,
}

impl Channel {
    /// The session must already have reserved `id`.
    pub(crate) fn create(
        session: Weak<Session>,
        id: u64,
        handler: Arc<dyn MessageHandler>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id,
            session,
            transport,
            handler,
            gate: Gate::new(),
        }
    }

    /// Session-unique id of this channel.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The owning session, if it is still alive.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.upgrade()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn handler(&self) -> &Arc<dyn MessageHandler> {
        &self.handler
    }

    pub fn is_open(&self) -> bool {
        !self.gate.is_closed()
    }

    /// Send a session message on this channel.
    ///
    /// The frame is the common header (session type, this channel's id and
    /// `additional_headers`), the [`BinaryMsgHeader`] carrying `message_id`,
    /// then whatever `body_builder` appends. The session writes the whole
    /// frame to the transport in one piece.
    pub fn send<F>(
        &self,
        body_builder: F,
        message_id: u32,
        additional_headers: Vec<AdditionalHeader>,
    ) -> Result<()>
    where
        F: FnOnce(&mut BytesMut) -> cdpchan_frame::Result<()>,
    {
        let _pass = self.gate.enter().ok_or(SessionError::ChannelClosed {
            channel_id: self.id,
        })?;
        let session = self.session.upgrade().ok_or(SessionError::ChannelClosed {
            channel_id: self.id,
        })?;

        let header = CommonHeader::session(self.id, additional_headers);
        let sub_header = BinaryMsgHeader::new(message_id);

        session
            .send(self.transport.as_ref(), header, |writer| {
                sub_header.write_to(writer);
                body_builder(writer)
            })
            .map_err(|err| match err {
                SessionError::SessionDisposed => SessionError::ChannelClosed {
                    channel_id: self.id,
                },
                other => other,
            })?;

        debug!(channel_id = self.id, message_id, "sent message");
        Ok(())
    }

    /// Send a pre-built body with no additional headers.
    pub fn send_binary(&self, body: &[u8], message_id: u32) -> Result<()> {
        self.send(
            |writer| {
                writer.extend_from_slice(body);
                Ok(())
            },
            message_id,
            Vec::new(),
        )
    }

    /// Hand an inbound message to the handler.
    ///
    /// Returns once the handler returns. Messages addressed to another channel
    /// are rejected without reaching the handler.
    pub fn deliver(&self, message: &Message) -> Result<()> {
        let _pass = self.gate.enter().ok_or(SessionError::ChannelClosed {
            channel_id: self.id,
        })?;

        if message.channel_id() != self.id {
            warn!(
                channel_id = self.id,
                target = message.channel_id(),
                "rejecting misrouted message"
            );
            return Err(SessionError::Misrouted {
                channel_id: self.id,
                target: message.channel_id(),
            });
        }

        self.handler.handle(message).map_err(SessionError::Handler)
    }

    /// Close the channel with [`Channel::dispose`], leaving session and
    /// transport open.
    pub fn close(&self) -> Result<()> {
        self.dispose(false, false)
    }

    /// Unregister from the session, optionally closing the shared transport
    /// and disposing the whole session.
    ///
    /// Idempotent: only the first call has any effect. Disposing the session
    /// re-enters this method for every registered channel, including this one,
    /// and those calls are no-ops.
    ///
    /// `close_transport` closes the transport even if other channels still
    /// use it.
    ///
    /// Called from outside any channel operation, this waits for sends and
    /// deliveries already running on other threads. Called from a handler it
    /// returns without waiting.
    pub fn dispose(&self, close_session: bool, close_transport: bool) -> Result<()> {
        if !self.gate.close() {
            debug!(channel_id = self.id, "channel already disposed");
            return Ok(());
        }
        info!(
            channel_id = self.id,
            close_session, close_transport, "disposing channel"
        );

        let session = self.session.upgrade();
        if let Some(session) = &session {
            session.unregister(self.id);
        }

        let mut result = Ok(());
        if close_transport {
            if let Err(err) = self.transport.close() {
                warn!(channel_id = self.id, error = %err, "failed to close transport");
                result = Err(err.into());
            }
        }

        if close_session {
            if let Some(session) = &session {
                session.dispose();
            }
        }

        result
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("transport", &self.transport.name())
            .field("open", &self.is_open())
            .finish()
    }
}
