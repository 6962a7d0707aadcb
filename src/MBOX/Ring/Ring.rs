// A view over one channel of the mailbox region

use std::sync::atomic::Ordering::Acquire;

use super::addressing::{validate_segment_length, Segment};
use super::layout::ChannelControl;
use crate::error::Result;
use crate::MBOX::Structs::MESSAGE_FOOTPRINT;

/// Single-producer / single-consumer byte ring view.
///
/// This struct is NOT stored in shared memory. It is a transient view that
/// holds a pointer to the channel's control block in the region header and
/// the channel's segment.
///
/// ### Concurrency Design:
/// - **Producer (`put`)**: writes header and command past `write_cursor`,
///   fences, then publishes the new `write_cursor` with release ordering.
/// - **Consumer (`get`, `clear`)**: acquires `write_cursor`, decodes, then
///   advances `read_cursor`. Out-of-order acknowledgment tombstones headers
///   in place and only sweeps `read_cursor` over a leading run of them.
pub struct ChannelRing {
    /// Pointer to the channel's control block in the region header.
    pub(crate) control: *const ChannelControl,

    /// The channel's ring bytes.
    pub(crate) segment: Segment,
}

unsafe impl Send for ChannelRing {}
unsafe impl Sync for ChannelRing {}

impl ChannelRing {
    /// Create a ring view over an existing control block and segment.
    ///
    /// Fails if the control block's segment length is not a power of two or
    /// cannot hold a single message.
    ///
    /// # Safety
    /// `control` must stay valid for the lifetime of the view and
    /// `segment_base` must point to `segment_length` mapped, writable,
    /// 4-byte aligned bytes.
    pub unsafe fn new(control: *const ChannelControl, segment_base: *mut u8) -> Result<Self> {
        let length = (*control).segment_length;
        validate_segment_length(length, MESSAGE_FOOTPRINT)?;
        let segment = Segment::new(segment_base, length)?;
        Ok(Self { control, segment })
    }

    #[inline]
    pub(crate) fn control(&self) -> &ChannelControl {
        // Safety: guaranteed by the constructor's contract.
        unsafe { &*self.control }
    }

    #[inline]
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    #[inline]
    pub fn segment_length(&self) -> u32 {
        self.segment.length()
    }

    pub fn write_cursor(&self) -> u32 {
        self.control().write_cursor.load(Acquire)
    }

    pub fn read_cursor(&self) -> u32 {
        self.control().read_cursor.load(Acquire)
    }

    /// Bytes published but not yet released by the consumer.
    pub fn readable(&self) -> u32 {
        self.write_cursor().wrapping_sub(self.read_cursor())
    }

    /// Free bytes as seen right now. Does not account for boundary padding.
    pub fn writable(&self) -> u32 {
        self.segment_length().saturating_sub(self.readable())
    }

    pub fn is_empty(&self) -> bool {
        self.readable() == 0
    }
}
