//! Inbound fragment reassembly.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use cdpchan_frame::{CommonHeader, Frame, Message};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};

/// Fragments of one message, keyed by `(channel_id, sequence_number)`.
struct Pending {
    header: CommonHeader,
    fragments: Vec<Option<Bytes>>,
    received: usize,
    bytes: usize,
}

/// Collects fragments until every piece of a message has arrived.
pub(crate) struct Reassembler {
    max_bytes: usize,
    buffered: usize,
    pending: HashMap<(u64, u32), Pending>,
}

impl Reassembler {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            buffered: 0,
            pending: HashMap::new(),
        }
    }

    /// Add a fragment; returns the whole message once the last piece arrives.
    pub(crate) fn push(&mut self, frame: Frame) -> Result<Option<Message>> {
        let header = &frame.header;
        let key = (header.channel_id, header.sequence_number);
        let count = header.fragment_count as usize;
        let index = header.fragment_index as usize;

        if index >= count {
            self.discard(&key);
            return Err(SessionError::Reassembly(format!(
                "fragment index {index} out of range (count {count})"
            )));
        }
        if self.buffered + frame.payload.len() > self.max_bytes {
            self.discard(&key);
            return Err(SessionError::Reassembly(format!(
                "reassembly buffer limit of {} bytes exceeded",
                self.max_bytes
            )));
        }

        let pending = self.pending.entry(key).or_insert_with(|| Pending {
            header: CommonHeader {
                fragment_index: 0,
                ..header.clone()
            },
            fragments: vec![None; count],
            received: 0,
            bytes: 0,
        });
        if pending.fragments.len() != count {
            self.discard(&key);
            return Err(SessionError::Reassembly(format!(
                "fragment count changed mid-message (channel {}, sequence {})",
                key.0, key.1
            )));
        }
        if pending.fragments[index].is_some() {
            warn!(channel_id = key.0, sequence = key.1, index, "duplicate fragment dropped");
            return Ok(None);
        }

        let len = frame.payload.len();
        pending.fragments[index] = Some(frame.payload);
        pending.received += 1;
        pending.bytes += len;
        self.buffered += len;
        debug!(
            channel_id = key.0,
            sequence = key.1,
            index,
            count,
            "buffered fragment"
        );

        if pending.received < count {
            return Ok(None);
        }

        let Some(done) = self.pending.remove(&key) else {
            return Ok(None);
        };
        self.buffered -= done.bytes;
        let mut body = BytesMut::with_capacity(done.bytes);
        for fragment in done.fragments.into_iter().flatten() {
            body.extend_from_slice(&fragment);
        }
        Ok(Some(Message::new(done.header, body.freeze())))
    }

    /// Drop every partially received message.
    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.buffered = 0;
    }

    fn discard(&mut self, key: &(u64, u32)) {
        if let Some(dropped) = self.pending.remove(key) {
            self.buffered -= dropped.bytes;
        }
    }
}
