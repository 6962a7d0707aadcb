// Segment addressing: logical cursors to physical offsets inside one ring

use std::ptr::{self, NonNull};

use crate::error::{MailboxError, Result};

/// Largest accepted segment. Keeps `write - read` unambiguous for `u32` cursors.
pub const MAX_SEGMENT_LENGTH: u32 = 1 << 31;

/// Physical offset of `cursor` in a segment of `segment_length` bytes.
///
/// `segment_length` must be a power of two; the mask is only correct then.
/// A zero length maps every cursor to itself instead of panicking.
#[inline]
pub const fn to_physical(segment_length: u32, cursor: u32) -> u32 {
    cursor & segment_length.wrapping_sub(1)
}

/// Checks the capacity rules every channel segment must satisfy.
pub fn validate_segment_length(segment_length: u32, minimum: u32) -> Result<()> {
    if !segment_length.is_power_of_two() {
        return Err(MailboxError::invalid(format!(
            "segment length {segment_length} is not a power of two"
        )));
    }
    if segment_length < minimum {
        return Err(MailboxError::invalid(format!(
            "segment length {segment_length} is smaller than {minimum}"
        )));
    }
    if segment_length > MAX_SEGMENT_LENGTH {
        return Err(MailboxError::invalid(format!(
            "segment length {segment_length} exceeds {MAX_SEGMENT_LENGTH}"
        )));
    }
    Ok(())
}

/// Typed view over one channel's ring bytes.
///
/// The only place raw offsets are turned into pointers. Every access goes
/// through [`to_physical`], so a structure may straddle the segment end as
/// long as each 4-byte field starts on a 4-byte cursor.
#[derive(Clone, Copy)]
pub struct Segment {
    base: NonNull<u8>,
    length: u32,
}

impl Segment {
    /// # Safety
    /// `base` must point to `length` bytes that stay mapped, 4-byte aligned,
    /// for as long as the view is used.
    pub unsafe fn new(base: *mut u8, length: u32) -> Result<Self> {
        validate_segment_length(length, 4)?;
        let base = NonNull::new(base)
            .ok_or_else(|| MailboxError::invalid("segment base is null"))?;
        if base.as_ptr() as usize % 4 != 0 {
            return Err(MailboxError::invalid("segment base is not 4-byte aligned"));
        }
        Ok(Self { base, length })
    }

    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    #[inline]
    pub fn base_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    #[inline]
    pub fn physical(&self, cursor: u32) -> u32 {
        to_physical(self.length, cursor)
    }

    /// Bytes between `cursor`'s physical position and the segment end.
    #[inline]
    pub fn remaining_to_end(&self, cursor: u32) -> u32 {
        self.length - self.physical(cursor)
    }

    #[inline]
    fn field_ptr(&self, cursor: u32) -> *mut u32 {
        let phys = self.physical(cursor) as usize;
        debug_assert!(cursor % 4 == 0, "unaligned field cursor {cursor}");
        debug_assert!(phys + 4 <= self.length as usize);
        // Safety: phys < length and the segment is mapped for `length` bytes.
        unsafe { self.base.as_ptr().add(phys) as *mut u32 }
    }

    /// Reads the little-endian word at `cursor`.
    #[inline]
    pub fn load_u32(&self, cursor: u32) -> u32 {
        // Volatile: the other domain may rewrite this memory behind our back.
        u32::from_le(unsafe { ptr::read_volatile(self.field_ptr(cursor)) })
    }

    /// Writes a little-endian word at `cursor`.
    #[inline]
    pub fn store_u32(&self, cursor: u32, value: u32) {
        unsafe { ptr::write_volatile(self.field_ptr(cursor), value.to_le()) }
    }
}

unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_cursor_into_segment() {
        assert_eq!(to_physical(64, 0), 0);
        assert_eq!(to_physical(64, 40), 40);
        assert_eq!(to_physical(64, 64), 0);
        assert_eq!(to_physical(64, 96), 32);
        assert_eq!(to_physical(4096, u32::MAX), 4095);
        assert_eq!(to_physical(0, 40), 40);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(validate_segment_length(96, 56).is_err());
        assert!(validate_segment_length(32, 56).is_err());
        assert!(validate_segment_length(0, 0).is_err());
        assert!(validate_segment_length(64, 56).is_ok());
        assert!(validate_segment_length(MAX_SEGMENT_LENGTH, 56).is_ok());
    }

    #[test]
    fn field_access_wraps() {
        let mut backing = vec![0u32; 16];
        let seg = unsafe { Segment::new(backing.as_mut_ptr() as *mut u8, 64).unwrap() };
        seg.store_u32(64 + 8, 0xDEAD_BEEF);
        assert_eq!(seg.load_u32(8), 0xDEAD_BEEF);
        assert_eq!(seg.remaining_to_end(60), 4);
        assert_eq!(seg.remaining_to_end(64), 64);
        assert_eq!(backing[2], u32::to_le(0xDEAD_BEEF));
    }
}
