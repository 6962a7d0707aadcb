// src/MBOX/consumer.rs

use crate::error::Result;
use crate::MBOX::channel::ChannelId;
use crate::MBOX::Ring::ChannelRing;
use crate::MBOX::Structs::{Command, Message};
use parking_lot::Mutex;

/// The reading end of one channel.
///
/// Two ways to consume: [`Consumer::get`] / [`Consumer::receive`] release a
/// message immediately, while [`Consumer::reference`] + [`Consumer::clear`]
/// keep messages pending until they are acknowledged, in any order. The two
/// can be mixed: releasing a message also releases any acknowledged ones
/// right behind it.
pub struct Consumer {
    ring: ChannelRing,
    channel: ChannelId,
    guard: Mutex<()>,
}

impl Consumer {
    pub(crate) fn new(ring: ChannelRing, channel: ChannelId) -> Self {
        Self {
            ring,
            channel,
            guard: Mutex::new(()),
        }
    }

    fn observe<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            tracing::warn!(channel = %self.channel, error = %err, "consume failed");
        }
        result
    }

    /// Consumes the next message header. Returns `Ok(None)` when empty.
    pub fn get(&self) -> Result<Option<Message>> {
        let _guard = self.guard.lock();
        self.observe(self.ring.get())
    }

    /// Consumes the next message together with its command.
    pub fn receive(&self) -> Result<Option<(Message, Command)>> {
        let _guard = self.guard.lock();
        self.observe(self.ring.take())
    }

    pub fn peek(&self) -> Result<Option<Message>> {
        let _guard = self.guard.lock();
        self.ring.peek()
    }

    /// Iterates pending messages without consuming them.
    pub fn reference(&self, previous: Option<&Message>) -> Result<Option<Message>> {
        let _guard = self.guard.lock();
        self.ring.reference(previous)
    }

    pub fn get_command(&self, message: &Message) -> Result<Command> {
        let _guard = self.guard.lock();
        self.ring.get_command(message)
    }

    /// Acknowledges a message obtained through `peek` or `reference`.
    pub fn clear(&self, message: &Message) -> Result<()> {
        let _guard = self.guard.lock();
        self.observe(self.ring.clear(message))
    }

    /// All pending, unacknowledged messages in ring order.
    pub fn pending(&self) -> Result<Vec<Message>> {
        let _guard = self.guard.lock();
        self.ring.pending()
    }

    /// Returns the channel this consumer reads from
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn ring(&self) -> &ChannelRing {
        &self.ring
    }
}
