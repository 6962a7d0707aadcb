// Layout conformance tests for the shared region.
// The host and the firmware are built separately, so the wire records and
// the control blocks must keep these exact sizes and field offsets.
use mbox_ring::MBOX::channel::CHANNEL_COUNT;
use mbox_ring::MBOX::Ring::layout::{header_span, ChannelControl, RegionHeader, SEGMENT_ALIGN};
use mbox_ring::MBOX::Structs::{Command, Message, COMMAND_SIZE, HEADER_SIZE};
use crossbeam_utils::CachePadded;
use memoffset::offset_of;
use std::mem::{align_of, size_of};
use std::sync::atomic::AtomicU32;

#[test]
fn test_message_layout() {
    let size = size_of::<Message>();
    println!(
        "Message => size: {size}, align: {}, offsets: [magic:{}, id:{}, command_kind:{}, payload_length:{}, payload_offset:{}, self_position:{}]",
        align_of::<Message>(),
        offset_of!(Message, magic),
        offset_of!(Message, id),
        offset_of!(Message, command_kind),
        offset_of!(Message, payload_length),
        offset_of!(Message, payload_offset),
        offset_of!(Message, self_position),
    );

    assert_eq!(size, HEADER_SIZE as usize);
    assert_eq!(align_of::<Message>(), 4);
    assert_eq!(offset_of!(Message, magic), 0);
    assert_eq!(offset_of!(Message, id), 4);
    assert_eq!(offset_of!(Message, command_kind), 8);
    assert_eq!(offset_of!(Message, payload_length), 12);
    assert_eq!(offset_of!(Message, payload_offset), 16);
    assert_eq!(offset_of!(Message, self_position), 20);
}

#[test]
fn test_command_layout() {
    let size = size_of::<Command>();
    println!(
        "Command => size: {size}, offsets: [length:{}, flags:{}, payload_pointer:{}, params:{}]",
        offset_of!(Command, length),
        offset_of!(Command, flags),
        offset_of!(Command, payload_pointer),
        offset_of!(Command, params),
    );

    assert_eq!(size, COMMAND_SIZE as usize);
    assert_eq!(offset_of!(Command, length), 0);
    assert_eq!(offset_of!(Command, flags), 4);
    assert_eq!(offset_of!(Command, payload_pointer), 8);
    assert_eq!(offset_of!(Command, params), 12);
}

#[test]
fn test_channel_control_layout() {
    let size = size_of::<ChannelControl>();
    let align = align_of::<ChannelControl>();
    let off_write = offset_of!(ChannelControl, write_cursor);
    let off_read = offset_of!(ChannelControl, read_cursor);
    println!(
        "ChannelControl => size: {size}, align: {align}, offsets: [segment_offset:{}, segment_length:{}, write_cursor:{off_write}, read_cursor:{off_read}]",
        offset_of!(ChannelControl, segment_offset),
        offset_of!(ChannelControl, segment_length),
    );

    assert_eq!(align, 128);
    assert_eq!(size % 128, 0);
    assert_eq!(offset_of!(ChannelControl, segment_offset), 0);
    assert_eq!(offset_of!(ChannelControl, segment_length), 4);
    // The two cursors never share a cache line.
    let line = align_of::<CachePadded<AtomicU32>>();
    assert!(off_read - off_write >= line);
    assert_eq!(off_write % line, 0);
    assert_eq!(off_read % line, 0);
}

#[test]
fn test_region_header_layout() {
    let size = size_of::<RegionHeader>();
    let off_channels = offset_of!(RegionHeader, channels);
    println!("RegionHeader => size: {size}, channels at {off_channels}, span: {}", header_span());

    // The boot words are adjacent at the start of the region.
    assert_eq!(offset_of!(RegionHeader, device_ready), 0);
    assert_eq!(offset_of!(RegionHeader, warm_signature), 4);
    assert_eq!(offset_of!(RegionHeader, version), 8);
    assert_eq!(offset_of!(RegionHeader, channel_count), 12);
    assert_eq!(off_channels % 128, 0);
    assert_eq!(size, off_channels + CHANNEL_COUNT * size_of::<ChannelControl>());
    assert_eq!(header_span() % SEGMENT_ALIGN, 0);
    assert!(header_span() >= size);
}
