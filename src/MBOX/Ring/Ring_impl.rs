use std::sync::atomic::fence;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};

use super::codec::{read_command, read_magic, read_message, write_command, write_magic, write_message};
use super::Ring::ChannelRing;
use crate::error::{DesyncKind, MailboxError, Result};
use crate::MBOX::Structs::{
    Command, Message, MessageState, COMMAND_SIZE, HEADER_SIZE, MESSAGE_FOOTPRINT,
    MESSAGE_MAGIC_TOMBSTONE, MESSAGE_MAGIC_VALID,
};

impl ChannelRing {
    fn desync(&self, cursor: u32, kind: DesyncKind) -> MailboxError {
        tracing::warn!(
            segment_offset = self.control().segment_offset,
            cursor,
            %kind,
            "mailbox ring desync"
        );
        MailboxError::ProtocolDesync { cursor, kind }
    }

    /// Publish one message and its command record.
    ///
    /// On success `message.payload_offset` holds the logical cursor of the
    /// command record. The command record is always physically contiguous:
    /// if it would straddle the segment end, the tail of the segment is
    /// left as padding and the record starts at physical offset 0.
    ///
    /// Padding can push a message past `segment_length` in segments smaller
    /// than [`MIN_CHANNEL_CAPACITY`]; such a cursor position never accepts a
    /// message. Mailbox channels are never built that small.
    ///
    /// [`MIN_CHANNEL_CAPACITY`]: crate::MBOX::channel::MIN_CHANNEL_CAPACITY
    pub fn put(&self, message: &mut Message, command: &Command) -> Result<()> {
        if command.length != COMMAND_SIZE {
            return Err(MailboxError::invalid(format!(
                "command length {} != {COMMAND_SIZE}",
                command.length
            )));
        }
        if message.magic != MESSAGE_MAGIC_VALID {
            return Err(MailboxError::invalid(format!(
                "message magic 0x{:08x} is not valid",
                message.magic
            )));
        }

        let ctl = self.control();
        let length = self.segment_length();
        // Our own cursor; only this side ever stores it.
        let write = ctl.write_cursor.load(Relaxed);
        let read = ctl.read_cursor.load(Acquire);

        let used = write.wrapping_sub(read);
        if used > length {
            return Err(self.desync(write, DesyncKind::CursorOverrun { write, read }));
        }
        let writable = length - used;
        if writable < HEADER_SIZE {
            return Err(MailboxError::OutOfSpace {
                needed: HEADER_SIZE,
                writable,
            });
        }

        let mut command_cursor = write.wrapping_add(HEADER_SIZE);
        let mut end_cursor = command_cursor.wrapping_add(command.length);
        let tail = self.segment.remaining_to_end(command_cursor);
        if tail < command.length {
            command_cursor = command_cursor.wrapping_add(tail);
            end_cursor = end_cursor.wrapping_add(tail);
        }

        let needed = end_cursor.wrapping_sub(write);
        if needed > writable {
            return Err(MailboxError::OutOfSpace { needed, writable });
        }

        message.payload_offset = command_cursor;
        message.payload_length = command.length;
        message.self_position = 0;

        let mut record = *command;
        if record.has_trailing_payload() {
            record.payload_pointer = command_cursor.wrapping_add(COMMAND_SIZE);
        }

        write_message(&self.segment, write, message);
        write_command(&self.segment, command_cursor, &record);

        // Header and command must be visible before the cursor moves.
        fence(Release);
        ctl.write_cursor.store(end_cursor, Release);
        fence(SeqCst);

        tracing::trace!(
            id = message.id,
            kind = message.command_kind,
            cursor = write,
            end = end_cursor,
            padding = needed - MESSAGE_FOOTPRINT,
            "put"
        );
        Ok(())
    }

    /// Decode the header at `cursor` against a published `write` cursor.
    ///
    /// Returns tombstoned headers as well; callers decide what they mean.
    fn decode_at(&self, cursor: u32, write: u32) -> Result<Option<Message>> {
        let readable = write.wrapping_sub(cursor);
        if readable == 0 {
            return Ok(None);
        }
        if readable > self.segment_length() {
            return Err(self.desync(cursor, DesyncKind::CursorOverrun { write, read: cursor }));
        }
        if readable < HEADER_SIZE {
            return Err(self.desync(cursor, DesyncKind::Truncated { readable }));
        }

        let mut message = read_message(&self.segment, cursor);
        if message.state() == MessageState::Garbage {
            let magic = message.magic;
            return Err(self.desync(cursor, DesyncKind::BadMagic { magic }));
        }
        if message.payload_length != COMMAND_SIZE {
            let length = message.payload_length;
            return Err(self.desync(cursor, DesyncKind::BadLength { length }));
        }
        let span = message.end_cursor().wrapping_sub(cursor);
        if span > readable || span < MESSAGE_FOOTPRINT {
            let end = message.end_cursor();
            return Err(self.desync(cursor, DesyncKind::PayloadOverrun { end, write }));
        }

        message.self_position = cursor;
        Ok(Some(message))
    }

    /// Decode the next message at `read_cursor` without consuming it.
    fn decode_head(&self) -> Result<Option<Message>> {
        let ctl = self.control();
        let read = ctl.read_cursor.load(Relaxed);
        let write = ctl.write_cursor.load(Acquire);
        match self.decode_at(read, write)? {
            Some(message) if message.state() == MessageState::Tombstoned => {
                Err(self.desync(read, DesyncKind::Tombstoned))
            }
            other => Ok(other),
        }
    }

    /// Advance `cursor` over a contiguous run of tombstoned messages.
    fn sweep(&self, mut cursor: u32, write: u32) -> Result<u32> {
        while let Some(head) = self.decode_at(cursor, write)? {
            if head.state() != MessageState::Tombstoned {
                break;
            }
            cursor = head.end_cursor();
        }
        Ok(cursor)
    }

    /// Move `read_cursor` past `message` and any tombstones acknowledged
    /// out of order right behind it.
    fn release(&self, message: &Message) -> u32 {
        let ctl = self.control();
        let write = ctl.write_cursor.load(Acquire);
        let end = message.end_cursor();
        // A desync further in is reported by the next read, not this one.
        let read = self.sweep(end, write).unwrap_or(end);
        ctl.read_cursor.store(read, Release);
        read
    }

    /// Consume the next message, advancing `read_cursor` past its command.
    ///
    /// Returns `Ok(None)` when the ring is empty. Once this returns the
    /// producer may reuse the message's bytes, so fetch the command with
    /// [`ChannelRing::take`] when it is needed.
    pub fn get(&self) -> Result<Option<Message>> {
        let Some(message) = self.decode_head()? else {
            return Ok(None);
        };
        let read = self.release(&message);
        tracing::trace!(id = message.id, cursor = message.self_position, read, "get");
        Ok(Some(message))
    }

    /// Consume the next message together with its command record.
    pub fn take(&self) -> Result<Option<(Message, Command)>> {
        let Some(message) = self.decode_head()? else {
            return Ok(None);
        };
        let command = self.get_command(&message)?;
        let read = self.release(&message);
        tracing::trace!(id = message.id, cursor = message.self_position, read, "take");
        Ok(Some((message, command)))
    }

    /// Like [`ChannelRing::get`] but leaves `read_cursor` untouched.
    pub fn peek(&self) -> Result<Option<Message>> {
        self.decode_head()
    }

    /// The pending message after `previous`, or the first pending one.
    ///
    /// Tombstoned messages that have not been swept yet are skipped.
    pub fn reference(&self, previous: Option<&Message>) -> Result<Option<Message>> {
        let ctl = self.control();
        let read = ctl.read_cursor.load(Relaxed);
        let write = ctl.write_cursor.load(Acquire);

        let mut cursor = match previous {
            Some(prev) => {
                let start = prev.end_cursor();
                if start.wrapping_sub(read) > write.wrapping_sub(read) {
                    return Err(MailboxError::invalid(format!(
                        "message at {} is no longer pending",
                        prev.self_position
                    )));
                }
                start
            }
            None => read,
        };

        // Each step moves at least one footprint forward, bounded by `write`.
        loop {
            match self.decode_at(cursor, write)? {
                Some(message) if message.state() == MessageState::Tombstoned => {
                    cursor = message.end_cursor();
                }
                other => return Ok(other),
            }
        }
    }

    /// Read the command record belonging to `message`.
    pub fn get_command(&self, message: &Message) -> Result<Command> {
        if message.payload_length != COMMAND_SIZE {
            return Err(MailboxError::invalid(format!(
                "payload length {} != {COMMAND_SIZE}",
                message.payload_length
            )));
        }
        let command = read_command(&self.segment, message.payload_offset);
        if command.length != COMMAND_SIZE {
            let length = command.length;
            return Err(self.desync(message.payload_offset, DesyncKind::BadLength { length }));
        }
        Ok(command)
    }

    /// Acknowledge `message`, possibly out of order.
    ///
    /// The header is tombstoned in place; `read_cursor` then sweeps over
    /// every tombstoned message at the head of the ring.
    pub fn clear(&self, message: &Message) -> Result<()> {
        let ctl = self.control();
        let read = ctl.read_cursor.load(Relaxed);
        let write = ctl.write_cursor.load(Acquire);

        let position = message.self_position;
        if position.wrapping_sub(read) >= write.wrapping_sub(read) {
            return Err(MailboxError::invalid(format!(
                "message at {position} is not pending (read {read}, write {write})"
            )));
        }
        match read_magic(&self.segment, position) {
            MESSAGE_MAGIC_VALID | MESSAGE_MAGIC_TOMBSTONE => {}
            magic => return Err(self.desync(position, DesyncKind::BadMagic { magic })),
        }
        write_magic(&self.segment, position, MESSAGE_MAGIC_TOMBSTONE);

        let cursor = self.sweep(read, write)?;
        if cursor != read {
            ctl.read_cursor.store(cursor, Release);
        }

        tracing::trace!(id = message.id, position, read = cursor, "clear");
        Ok(())
    }

    /// Every pending, non-tombstoned message in ring order.
    pub fn pending(&self) -> Result<Vec<Message>> {
        let mut out = Vec::new();
        let mut previous = None;
        while let Some(message) = self.reference(previous.as_ref())? {
            out.push(message);
            previous = Some(message);
        }
        Ok(out)
    }
}
