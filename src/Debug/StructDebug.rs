use std::fmt;
use crate::Core::region::Region;
use crate::MBOX::channel::ChannelId;
use crate::MBOX::Ring::ChannelRing;
use crate::MBOX::Structs::Message;
use crate::MBOX::{Consumer, Mailbox, Producer};

/// Debug function for Region
///
/// Shows the header location, the boot words and the channel table without
/// touching ring contents.
pub fn debug_region(region: &Region, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Region")
        .field("shm", &"<opaque>")
        .field("header", &format_args!("{:p}", region.header_ptr()))
        .field("size", &region.size())
        .field("used", &region.used_memory())
        .field("formatted", &region.is_formatted())
        .field("device_ready", &region.is_device_ready())
        .field("capacities", &region.capacities())
        .finish()
}

/// Debug function for ChannelRing
///
/// Cursors are loaded once each; the other side may move them meanwhile.
pub fn debug_channel_ring(ring: &ChannelRing, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelRing")
        .field("segment", &format_args!("{:p}", ring.segment().base_ptr()))
        .field("length", &ring.segment_length())
        .field("write_cursor", &ring.write_cursor())
        .field("read_cursor", &ring.read_cursor())
        .finish()
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("channel", &self.channel())
            .field("ring", self.ring())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("channel", &self.channel())
            .field("ring", self.ring())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("role", &self.role())
            .field("boot_kind", &self.boot_kind())
            .field("region", self.region())
            .finish_non_exhaustive()
    }
}

/// Snapshot of every pending message, per consumed channel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingDump {
    pub channels: Vec<(ChannelId, Vec<Message>)>,
}

impl PendingDump {
    pub fn total(&self) -> usize {
        self.channels.iter().map(|(_, pending)| pending.len()).sum()
    }

    pub fn for_channel(&self, channel: ChannelId) -> &[Message] {
        self.channels
            .iter()
            .find(|(id, _)| *id == channel)
            .map(|(_, pending)| pending.as_slice())
            .unwrap_or(&[])
    }
}

impl fmt::Display for PendingDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (channel, pending) in &self.channels {
            writeln!(f, "{channel}: {} pending", pending.len())?;
            for m in pending {
                writeln!(
                    f,
                    "  @{:<10} id={:<6} kind={:<4} cmd@{}",
                    m.self_position, m.id, m.command_kind, m.payload_offset
                )?;
            }
        }
        Ok(())
    }
}
