mod builder;
mod consumer;
mod mailbox;
mod producer;

pub mod channel;
pub mod handshake;

pub use builder::{MailboxBuilder, MailboxConfig, DEFAULT_BOOT_TIMEOUT, DEFAULT_REGION_NAME};
pub use channel::{ChannelId, Direction, Priority, Role};
pub use consumer::Consumer;
pub use handshake::{BootControl, BootKind};
pub use mailbox::Mailbox;
pub use producer::Producer;

pub mod Ring {
    pub mod addressing;
    pub mod codec;
    pub mod layout;
    pub mod Ring;
    pub mod Ring_impl;
    pub use Ring::ChannelRing; // re-export for stable path
}

pub mod Structs {
    pub mod Message_Structs;
    pub use Message_Structs::*; // re-export for stable path
}
