// Field-at-a-time encoding of message headers and command records

use super::addressing::Segment;
use crate::MBOX::Structs::{Command, Message, COMMAND_PARAMS, COMMAND_SIZE, HEADER_SIZE};

// Header field offsets.
pub const MSG_MAGIC: u32 = 0;
pub const MSG_ID: u32 = 4;
pub const MSG_KIND: u32 = 8;
pub const MSG_PAYLOAD_LENGTH: u32 = 12;
pub const MSG_PAYLOAD_OFFSET: u32 = 16;
pub const MSG_SELF_POSITION: u32 = 20;

// Command field offsets.
pub const CMD_LENGTH: u32 = 0;
pub const CMD_FLAGS: u32 = 4;
pub const CMD_PAYLOAD_POINTER: u32 = 8;
pub const CMD_PARAMS: u32 = 12;

#[inline]
fn at(cursor: u32, offset: u32) -> u32 {
    cursor.wrapping_add(offset)
}

/// Writes `message` at `cursor` and returns the cursor just past the header.
pub fn write_message(seg: &Segment, cursor: u32, message: &Message) -> u32 {
    seg.store_u32(at(cursor, MSG_MAGIC), message.magic);
    seg.store_u32(at(cursor, MSG_ID), message.id);
    seg.store_u32(at(cursor, MSG_KIND), message.command_kind);
    seg.store_u32(at(cursor, MSG_PAYLOAD_LENGTH), message.payload_length);
    seg.store_u32(at(cursor, MSG_PAYLOAD_OFFSET), message.payload_offset);
    seg.store_u32(at(cursor, MSG_SELF_POSITION), message.self_position);
    cursor.wrapping_add(HEADER_SIZE)
}

pub fn read_message(seg: &Segment, cursor: u32) -> Message {
    Message {
        magic: seg.load_u32(at(cursor, MSG_MAGIC)),
        id: seg.load_u32(at(cursor, MSG_ID)),
        command_kind: seg.load_u32(at(cursor, MSG_KIND)),
        payload_length: seg.load_u32(at(cursor, MSG_PAYLOAD_LENGTH)),
        payload_offset: seg.load_u32(at(cursor, MSG_PAYLOAD_OFFSET)),
        self_position: seg.load_u32(at(cursor, MSG_SELF_POSITION)),
    }
}

/// Rewrites only the magic of the header at `cursor`.
pub fn write_magic(seg: &Segment, cursor: u32, magic: u32) {
    seg.store_u32(at(cursor, MSG_MAGIC), magic);
}

pub fn read_magic(seg: &Segment, cursor: u32) -> u32 {
    seg.load_u32(at(cursor, MSG_MAGIC))
}

/// Writes `command` at `cursor` and returns the cursor just past the record.
pub fn write_command(seg: &Segment, cursor: u32, command: &Command) -> u32 {
    seg.store_u32(at(cursor, CMD_LENGTH), command.length);
    seg.store_u32(at(cursor, CMD_FLAGS), command.flags);
    seg.store_u32(at(cursor, CMD_PAYLOAD_POINTER), command.payload_pointer);
    for (i, word) in command.params.iter().enumerate() {
        seg.store_u32(at(cursor, CMD_PARAMS + 4 * i as u32), *word);
    }
    cursor.wrapping_add(COMMAND_SIZE)
}

pub fn read_command(seg: &Segment, cursor: u32) -> Command {
    let mut params = [0u32; COMMAND_PARAMS];
    for (i, word) in params.iter_mut().enumerate() {
        *word = seg.load_u32(at(cursor, CMD_PARAMS + 4 * i as u32));
    }
    Command {
        length: seg.load_u32(at(cursor, CMD_LENGTH)),
        flags: seg.load_u32(at(cursor, CMD_FLAGS)),
        payload_pointer: seg.load_u32(at(cursor, CMD_PAYLOAD_POINTER)),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MBOX::Structs::MESSAGE_MAGIC_VALID;

    fn segment(words: &mut [u32]) -> Segment {
        let len = (words.len() * 4) as u32;
        unsafe { Segment::new(words.as_mut_ptr() as *mut u8, len).unwrap() }
    }

    #[test]
    fn field_offsets_cover_records() {
        assert_eq!(MSG_SELF_POSITION + 4, HEADER_SIZE);
        assert_eq!(CMD_PARAMS + 4 * COMMAND_PARAMS as u32, COMMAND_SIZE);
    }

    #[test]
    fn header_straddling_segment_end() {
        let mut words = vec![0u32; 16];
        let seg = segment(&mut words);
        let msg = Message {
            magic: MESSAGE_MAGIC_VALID,
            id: 7,
            command_kind: 3,
            payload_length: COMMAND_SIZE,
            payload_offset: 112,
            self_position: 0,
        };
        // Physical 52..64 then 0..12.
        let next = write_message(&seg, 52, &msg);
        assert_eq!(next, 76);
        assert_eq!(read_message(&seg, 52), msg);
        assert_eq!(read_message(&seg, 52 + 64 * 3), msg);
        assert_eq!(words[15], u32::to_le(3));
        assert_eq!(words[0], u32::to_le(COMMAND_SIZE));
    }

    #[test]
    fn command_and_magic() {
        let mut words = vec![0u32; 16];
        let seg = segment(&mut words);
        let cmd = Command::new([1, 2, 3, 4, 5]).with_trailing_payload();
        assert_eq!(write_command(&seg, 64, &cmd), 96);
        assert_eq!(read_command(&seg, 0), cmd);
        write_magic(&seg, 32, 0xAAAA_5555);
        assert_eq!(read_magic(&seg, 96), 0xAAAA_5555);
    }
}
