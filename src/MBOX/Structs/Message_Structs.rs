// Records carried by a mailbox ring: a fixed header plus one fixed command

// no atomics here; plain integral types so the layout matches the wire format

/// Header magic of a live message.
pub const MESSAGE_MAGIC_VALID: u32 = 0x4D53_4721; // "MSG!"
/// Header magic of a message the consumer has acknowledged.
pub const MESSAGE_MAGIC_TOMBSTONE: u32 = 0x544F_4D42; // "TOMB"

/// Bytes occupied by one message header in the ring.
pub const HEADER_SIZE: u32 = 24;
/// Bytes occupied by one command record in the ring.
pub const COMMAND_SIZE: u32 = 32;
/// Smallest possible ring footprint of one message.
pub const MESSAGE_FOOTPRINT: u32 = HEADER_SIZE + COMMAND_SIZE;
/// Largest ring footprint of one message, including boundary-skip padding.
pub const MESSAGE_MAX_SPAN: u32 = MESSAGE_FOOTPRINT + COMMAND_SIZE - 4;

/// Number of opaque parameter words in a command.
pub const COMMAND_PARAMS: usize = 5;

/// The command carries a variable-length blob right after the fixed record.
pub const COMMAND_FLAG_TRAILING_PAYLOAD: u32 = 1 << 0;

/// Validity of a header as read from the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Valid,
    Tombstoned,
    Garbage,
}

/// Message header. All fields are little-endian on the wire.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    pub magic: u32,
    /// Caller-assigned correlation id, passed through untouched.
    pub id: u32,
    /// Opaque discriminator interpreted by the command's owner.
    pub command_kind: u32,
    pub payload_length: u32,
    /// Logical cursor where the command record starts.
    pub payload_offset: u32,
    /// Logical cursor of this header. Filled in by the consumer.
    pub self_position: u32,
}

impl Message {
    /// A fresh, valid header. Placement fields are filled in by `put`.
    pub fn new(id: u32, command_kind: u32) -> Self {
        Self {
            magic: MESSAGE_MAGIC_VALID,
            id,
            command_kind,
            payload_length: COMMAND_SIZE,
            payload_offset: 0,
            self_position: 0,
        }
    }

    pub fn state(&self) -> MessageState {
        match self.magic {
            MESSAGE_MAGIC_VALID => MessageState::Valid,
            MESSAGE_MAGIC_TOMBSTONE => MessageState::Tombstoned,
            _ => MessageState::Garbage,
        }
    }

    /// Logical cursor just past this message's command record.
    #[inline]
    pub fn end_cursor(&self) -> u32 {
        self.payload_offset.wrapping_add(self.payload_length)
    }
}

/// Fixed-size command record that follows each message header.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Command {
    /// Record length in bytes; must equal [`COMMAND_SIZE`].
    pub length: u32,
    pub flags: u32,
    /// Logical cursor of the trailing blob, patched by `put` when
    /// [`COMMAND_FLAG_TRAILING_PAYLOAD`] is set.
    pub payload_pointer: u32,
    pub params: [u32; COMMAND_PARAMS],
}

impl Default for Command {
    fn default() -> Self {
        Self {
            length: COMMAND_SIZE,
            flags: 0,
            payload_pointer: 0,
            params: [0; COMMAND_PARAMS],
        }
    }
}

impl Command {
    pub fn new(params: [u32; COMMAND_PARAMS]) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Marks the command as carrying a trailing blob.
    pub fn with_trailing_payload(mut self) -> Self {
        self.flags |= COMMAND_FLAG_TRAILING_PAYLOAD;
        self
    }

    pub fn has_trailing_payload(&self) -> bool {
        self.flags & COMMAND_FLAG_TRAILING_PAYLOAD != 0
    }
}
