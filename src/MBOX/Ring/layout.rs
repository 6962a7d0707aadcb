use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::MBOX::channel::CHANNEL_COUNT;

/// Version of the region layout below.
pub const REGION_VERSION: u32 = 1;

/// Written by the firmware once it has attached to the region.
pub const DEVICE_READY_SIGNATURE: u32 = 0x5244_5921; // "RDY!"

/// Written by the host after formatting; marks a region that can be reused.
pub const WARM_SIGNATURE: u32 = 0x5741_524D; // "WARM"

/// Alignment of the header and of every channel segment.
pub const SEGMENT_ALIGN: usize = 128;

/// Per-channel control block, stored in the region header.
///
/// `write_cursor` has exactly one writer (the producer side) and
/// `read_cursor` exactly one writer (the consumer side). Both are
/// ever-increasing `u32` byte counters that wrap at `u32::MAX`; the
/// physical ring position is `cursor & (segment_length - 1)`.
#[repr(C, align(128))]
pub struct ChannelControl {
    /// Byte offset of the ring from the start of the region.
    pub segment_offset: u32,

    /// Ring capacity in bytes. Always a power of two.
    pub segment_length: u32,

    /// Producer cursor. Padded so the two sides never share a line.
    pub write_cursor: CachePadded<AtomicU32>,

    /// Consumer cursor.
    pub read_cursor: CachePadded<AtomicU32>,
}

impl ChannelControl {
    pub fn new(segment_offset: u32, segment_length: u32) -> Self {
        Self {
            segment_offset,
            segment_length,
            write_cursor: CachePadded::new(AtomicU32::new(0)),
            read_cursor: CachePadded::new(AtomicU32::new(0)),
        }
    }

    /// Starts both cursors from `cursor`. Only valid while no peer is attached.
    pub fn reset_cursors(&self, cursor: u32) {
        self.write_cursor.store(cursor, Ordering::Relaxed);
        self.read_cursor.store(cursor, Ordering::Relaxed);
    }
}

/// The header at the very beginning of the mailbox region.
#[repr(C, align(128))]
pub struct RegionHeader {
    /// [`DEVICE_READY_SIGNATURE`] while the firmware is attached.
    pub device_ready: AtomicU32,

    /// [`WARM_SIGNATURE`] once the host has formatted the region.
    pub warm_signature: AtomicU32,

    pub version: u32,

    pub channel_count: u32,

    /// One control block per channel, in capacity-table order.
    pub channels: [ChannelControl; CHANNEL_COUNT],
}

/// Bytes reserved for the header, rounded up to the segment alignment.
pub const fn header_span() -> usize {
    let size = std::mem::size_of::<RegionHeader>();
    (size + SEGMENT_ALIGN - 1) & !(SEGMENT_ALIGN - 1)
}
