// In src/MBOX/producer.rs
use crate::error::{MailboxError, Result};
use crate::MBOX::channel::ChannelId;
use crate::MBOX::Ring::ChannelRing;
use crate::MBOX::Structs::{Command, Message};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// The writing end of one channel.
///
/// Every thread of the owning side goes through the same `Producer`; the
/// guard keeps the ring single-producer.
pub struct Producer {
    ring: ChannelRing,
    channel: ChannelId,
    guard: Mutex<()>,
    next_id: AtomicU32,
}

impl Producer {
    pub(crate) fn new(ring: ChannelRing, channel: ChannelId) -> Self {
        Self {
            ring,
            channel,
            guard: Mutex::new(()),
            next_id: AtomicU32::new(0),
        }
    }

    fn observe(&self, err: MailboxError) -> MailboxError {
        if !err.is_retryable() {
            tracing::warn!(channel = %self.channel, error = %err, "put failed");
        }
        err
    }

    /// Publishes `message` and `command`. See [`ChannelRing::put`].
    pub fn put(&self, message: &mut Message, command: &Command) -> Result<()> {
        let _guard = self.guard.lock();
        self.ring.put(message, command).map_err(|err| self.observe(err))
    }

    /// Sends `command` under the next correlation id and returns the header
    /// as published. Ids are only consumed by successful sends.
    pub fn send(&self, command_kind: u32, command: &Command) -> Result<Message> {
        let _guard = self.guard.lock();
        let id = self.next_id.load(Ordering::Relaxed);
        let mut message = Message::new(id, command_kind);
        self.ring
            .put(&mut message, command)
            .map_err(|err| self.observe(err))?;
        self.next_id.store(id.wrapping_add(1), Ordering::Relaxed);
        Ok(message)
    }

    /// Returns the channel this producer writes to
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn ring(&self) -> &ChannelRing {
        &self.ring
    }
}
