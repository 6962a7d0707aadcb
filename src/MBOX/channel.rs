// Channel identities and the static per-channel capacity table

use std::fmt;

use crate::error::{MailboxError, Result};
use crate::MBOX::Structs::MESSAGE_MAX_SPAN;

pub const CHANNEL_COUNT: usize = 4;

/// Default ring capacity of a low-priority channel, in bytes.
pub const LOW_PRIORITY_CAPACITY: u32 = 16 * 1024;
/// Default ring capacity of a high-priority channel, in bytes.
pub const HIGH_PRIORITY_CAPACITY: u32 = 4 * 1024;

/// Smallest capacity a mailbox channel accepts. Any empty ring of this size
/// can take one message wherever its cursors stand.
pub const MIN_CHANNEL_CAPACITY: u32 = MESSAGE_MAX_SPAN.next_power_of_two();

/// Capacity table in channel order. Segment offsets accumulate through it.
pub const DEFAULT_CAPACITIES: [u32; CHANNEL_COUNT] = [
    LOW_PRIORITY_CAPACITY,
    HIGH_PRIORITY_CAPACITY,
    LOW_PRIORITY_CAPACITY,
    HIGH_PRIORITY_CAPACITY,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    HostToFirmware,
    FirmwareToHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    High,
}

/// Which side of the region an endpoint runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Host,
    Firmware,
}

impl Role {
    /// Direction of the channels this side produces into.
    pub fn outgoing(self) -> Direction {
        match self {
            Role::Host => Direction::HostToFirmware,
            Role::Firmware => Direction::FirmwareToHost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChannelId {
    HostToFirmwareLow = 0,
    HostToFirmwareHigh = 1,
    FirmwareToHostLow = 2,
    FirmwareToHostHigh = 3,
}

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [
        ChannelId::HostToFirmwareLow,
        ChannelId::HostToFirmwareHigh,
        ChannelId::FirmwareToHostLow,
        ChannelId::FirmwareToHostHigh,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| MailboxError::invalid(format!("no channel with index {index}")))
    }

    pub fn direction(self) -> Direction {
        match self {
            ChannelId::HostToFirmwareLow | ChannelId::HostToFirmwareHigh => {
                Direction::HostToFirmware
            }
            ChannelId::FirmwareToHostLow | ChannelId::FirmwareToHostHigh => {
                Direction::FirmwareToHost
            }
        }
    }

    pub fn priority(self) -> Priority {
        match self {
            ChannelId::HostToFirmwareLow | ChannelId::FirmwareToHostLow => Priority::Low,
            ChannelId::HostToFirmwareHigh | ChannelId::FirmwareToHostHigh => Priority::High,
        }
    }

    pub fn lookup(direction: Direction, priority: Priority) -> Self {
        match (direction, priority) {
            (Direction::HostToFirmware, Priority::Low) => ChannelId::HostToFirmwareLow,
            (Direction::HostToFirmware, Priority::High) => ChannelId::HostToFirmwareHigh,
            (Direction::FirmwareToHost, Priority::Low) => ChannelId::FirmwareToHostLow,
            (Direction::FirmwareToHost, Priority::High) => ChannelId::FirmwareToHostHigh,
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelId::HostToFirmwareLow => "h2f-low",
            ChannelId::HostToFirmwareHigh => "h2f-high",
            ChannelId::FirmwareToHostLow => "f2h-low",
            ChannelId::FirmwareToHostHigh => "f2h-high",
        };
        f.write_str(name)
    }
}
