use std::sync::Arc;

use super::builder::MailboxConfig;
use super::channel::{ChannelId, Role};
use super::consumer::Consumer;
use super::handshake::{self, BootControl, BootKind};
use super::producer::Producer;
use super::Structs::{Command, Message};
use crate::Core::region::Region;
use crate::Core::SharedMemoryBackend;
use crate::Debug::StructDebug::PendingDump;
use crate::error::{MailboxError, Result};

/// One side of a mailbox region.
///
/// A host opens the region with [`Mailbox::open_host`], which formats it and
/// waits for the firmware; the firmware side opens the same memory with
/// [`Mailbox::open_firmware`]. Each side produces on the channels flowing
/// away from it and consumes the others.
pub struct Mailbox {
    region: Region,
    role: Role,
    boot_kind: Option<BootKind>,
    producers: Vec<Producer>,
    consumers: Vec<Consumer>,
    closed: bool,
}

impl Mailbox {
    /// Formats the region, boots the firmware through `boot` and waits for
    /// its ready signature.
    pub fn open_host(
        shm: Arc<dyn SharedMemoryBackend>,
        config: &MailboxConfig,
        boot: &mut dyn BootControl,
    ) -> Result<Self> {
        let region = Region::new(shm)?;
        let kind = handshake::host_boot(&region, &config.capacities, boot, config.boot_timeout)?;
        let mut mailbox = Self::with_endpoints(region, Role::Host)?;
        mailbox.boot_kind = Some(kind);
        tracing::debug!(?kind, size = mailbox.region.size(), "host mailbox open");
        Ok(mailbox)
    }

    /// Attaches to a region the host formatted and publishes readiness.
    pub fn open_firmware(shm: Arc<dyn SharedMemoryBackend>) -> Result<Self> {
        let region = Region::new(shm)?;
        region.validate()?;
        let mailbox = Self::with_endpoints(region, Role::Firmware)?;
        handshake::announce_ready(&mailbox.region);
        tracing::debug!(size = mailbox.region.size(), "firmware mailbox open");
        Ok(mailbox)
    }

    fn with_endpoints(region: Region, role: Role) -> Result<Self> {
        let mut producers = Vec::new();
        let mut consumers = Vec::new();
        for channel in ChannelId::ALL {
            let ring = region.channel(channel)?;
            if channel.direction() == role.outgoing() {
                producers.push(Producer::new(ring, channel));
            } else {
                consumers.push(Consumer::new(ring, channel));
            }
        }
        Ok(Self {
            region,
            role,
            boot_kind: None,
            producers,
            consumers,
            closed: false,
        })
    }

    /// Withdraws this side's readiness. The region stays warm for reuse.
    pub fn close(mut self) {
        self.shutdown(false);
    }

    /// Like [`Mailbox::close`], but forces the next host open to boot cold.
    /// Use after a [`MailboxError::ProtocolDesync`].
    pub fn invalidate(mut self) {
        self.shutdown(true);
    }

    fn shutdown(&mut self, invalidate: bool) {
        if self.closed {
            return;
        }
        self.closed = true;
        handshake::teardown(&self.region, invalidate);
        tracing::debug!(role = ?self.role, invalidate, "mailbox closed");
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// How the host booted the firmware. `None` on the firmware side.
    pub fn boot_kind(&self) -> Option<BootKind> {
        self.boot_kind
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// The producing end of `channel`, if this side owns it.
    pub fn producer(&self, channel: ChannelId) -> Result<&Producer> {
        self.producers
            .iter()
            .find(|p| p.channel() == channel)
            .ok_or_else(|| {
                MailboxError::invalid(format!("{:?} side cannot write to {channel}", self.role))
            })
    }

    /// The consuming end of `channel`, if this side owns it.
    pub fn consumer(&self, channel: ChannelId) -> Result<&Consumer> {
        self.consumers
            .iter()
            .find(|c| c.channel() == channel)
            .ok_or_else(|| {
                MailboxError::invalid(format!("{:?} side cannot read from {channel}", self.role))
            })
    }

    pub fn put(&self, channel: ChannelId, message: &mut Message, command: &Command) -> Result<()> {
        self.producer(channel)?.put(message, command)
    }

    pub fn send(&self, channel: ChannelId, command_kind: u32, command: &Command) -> Result<Message> {
        self.producer(channel)?.send(command_kind, command)
    }

    pub fn get(&self, channel: ChannelId) -> Result<Option<Message>> {
        self.consumer(channel)?.get()
    }

    pub fn receive(&self, channel: ChannelId) -> Result<Option<(Message, Command)>> {
        self.consumer(channel)?.receive()
    }

    pub fn peek(&self, channel: ChannelId) -> Result<Option<Message>> {
        self.consumer(channel)?.peek()
    }

    pub fn reference(&self, channel: ChannelId, previous: Option<&Message>) -> Result<Option<Message>> {
        self.consumer(channel)?.reference(previous)
    }

    pub fn get_command(&self, channel: ChannelId, message: &Message) -> Result<Command> {
        self.consumer(channel)?.get_command(message)
    }

    pub fn clear(&self, channel: ChannelId, message: &Message) -> Result<()> {
        self.consumer(channel)?.clear(message)
    }

    pub fn pending(&self, channel: ChannelId) -> Result<Vec<Message>> {
        self.consumer(channel)?.pending()
    }

    /// Logs every pending message on the channels this side consumes.
    pub fn dump(&self) -> Result<PendingDump> {
        let mut dump = PendingDump::default();
        for consumer in &self.consumers {
            let pending = consumer.pending()?;
            for message in &pending {
                tracing::info!(
                    channel = %consumer.channel(),
                    id = message.id,
                    kind = message.command_kind,
                    position = message.self_position,
                    payload = message.payload_offset,
                    "pending message"
                );
            }
            dump.channels.push((consumer.channel(), pending));
        }
        Ok(dump)
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}
