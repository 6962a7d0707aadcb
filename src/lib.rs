//! Shared-memory mailbox transport between a host driver and co-processor
//! firmware: per-direction, per-priority single-producer/single-consumer
//! byte rings with out-of-order acknowledgment.

// Module naming follows project convention (MBOX = mailbox transport)
#[allow(non_snake_case)]
pub mod MBOX;
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
    pub use StructDebug::PendingDump;
}
pub mod error;

pub use error::{DesyncKind, MailboxError, Result};
pub use MBOX::{ChannelId, Mailbox, MailboxBuilder, MailboxConfig};
