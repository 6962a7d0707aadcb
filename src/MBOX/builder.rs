use std::sync::Arc;
use std::time::Duration;

use super::channel::{ChannelId, CHANNEL_COUNT, DEFAULT_CAPACITIES};
use super::handshake::BootControl;
use super::Mailbox;
use crate::Core::region::required_size;
use crate::Core::SharedMemory::{attach_shared_memory, create_shared_memory};
use crate::MBOX::Ring::layout::header_span;
use crate::error::Result;

/// How long the host waits for the firmware's ready signature by default.
pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_millis(500);

/// Default file name of the region under `/dev/shm`.
pub const DEFAULT_REGION_NAME: &str = "mbox_ring";

/// Host-side mailbox configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxConfig {
    /// Ring capacity per channel in bytes, in [`ChannelId`] order.
    pub capacities: [u32; CHANNEL_COUNT],
    /// Upper bound on the boot handshake's ready poll.
    pub boot_timeout: Duration,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            capacities: DEFAULT_CAPACITIES,
            boot_timeout: DEFAULT_BOOT_TIMEOUT,
        }
    }
}

impl MailboxConfig {
    /// Bytes of shared memory this configuration needs.
    pub fn region_size(&self) -> Result<usize> {
        required_size(&self.capacities)
    }
}

pub struct MailboxBuilder {
    config: MailboxConfig,
    region_name: String,
}

impl Default for MailboxBuilder {
    fn default() -> Self {
        Self {
            config: MailboxConfig::default(),
            region_name: DEFAULT_REGION_NAME.to_string(),
        }
    }
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, channel: ChannelId, bytes: u32) -> Self {
        self.config.capacities[channel.index()] = bytes;
        self
    }

    pub fn with_capacities(mut self, capacities: [u32; CHANNEL_COUNT]) -> Self {
        self.config.capacities = capacities;
        self
    }

    pub fn with_boot_timeout(mut self, timeout: Duration) -> Self {
        self.config.boot_timeout = timeout;
        self
    }

    pub fn with_region_name(mut self, name: &str) -> Self {
        self.region_name = name.to_string();
        self
    }

    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    pub fn region_size(&self) -> Result<usize> {
        self.config.region_size()
    }

    /// Creates the `/dev/shm` region and runs the host side of the boot
    /// handshake.
    pub fn build_host(self, boot: &mut dyn BootControl) -> Result<Mailbox> {
        let size = self.config.region_size()?;
        let shm = create_shared_memory(size, Some(&self.region_name))?;
        Mailbox::open_host(Arc::from(shm), &self.config, boot)
    }

    /// Attaches to a region the host already formatted.
    pub fn build_firmware(self) -> Result<Mailbox> {
        let shm = attach_shared_memory(&self.region_name, header_span())?;
        Mailbox::open_firmware(Arc::from(shm))
    }
}
