use crate::Core::SharedMemory::{SharedMemoryBackend, REGION_ALIGN};
use crate::error::{MailboxError, Result};
use crate::MBOX::channel::{ChannelId, CHANNEL_COUNT, MIN_CHANNEL_CAPACITY};
use crate::MBOX::Ring::addressing::validate_segment_length;
use crate::MBOX::Ring::layout::{
    header_span, ChannelControl, RegionHeader, REGION_VERSION, SEGMENT_ALIGN, WARM_SIGNATURE,
};
use crate::MBOX::Ring::ChannelRing;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::Arc;
mod debug;
mod getters;

/// Where one channel's ring lives inside the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlacement {
    pub offset: u32,
    pub length: u32,
}

#[inline]
fn align_up(value: usize) -> usize {
    (value + SEGMENT_ALIGN - 1) & !(SEGMENT_ALIGN - 1)
}

/// Lay the capacity table out after the header, in table order.
pub fn plan_layout(capacities: &[u32; CHANNEL_COUNT]) -> Result<[SegmentPlacement; CHANNEL_COUNT]> {
    let mut placements = [SegmentPlacement { offset: 0, length: 0 }; CHANNEL_COUNT];
    let mut offset = header_span();
    for (i, &capacity) in capacities.iter().enumerate() {
        validate_segment_length(capacity, MIN_CHANNEL_CAPACITY).map_err(|e| {
            MailboxError::invalid(format!("channel {}: {e}", ChannelId::ALL[i]))
        })?;
        offset = align_up(offset);
        placements[i] = SegmentPlacement {
            offset: u32::try_from(offset)
                .map_err(|_| MailboxError::invalid("mailbox region exceeds 4 GiB"))?,
            length: capacity,
        };
        offset += capacity as usize;
    }
    if offset > u32::MAX as usize {
        return Err(MailboxError::invalid("mailbox region exceeds 4 GiB"));
    }
    Ok(placements)
}

/// Bytes of backing memory a capacity table needs.
pub fn required_size(capacities: &[u32; CHANNEL_COUNT]) -> Result<usize> {
    let placements = plan_layout(capacities)?;
    let last = placements[CHANNEL_COUNT - 1];
    Ok(last.offset as usize + last.length as usize)
}

/// The shared mailbox region: a header with the boot words and one control
/// block per channel, followed by the channel segments.
pub struct Region {
    shm: Arc<dyn SharedMemoryBackend>,
    header: *mut RegionHeader,
}

// The header is only mutated through atomics once a peer can see it.
unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Wrap backing memory. Nothing is read or written yet.
    pub fn new(shm: Arc<dyn SharedMemoryBackend>) -> Result<Self> {
        let header = shm.as_ptr() as *mut RegionHeader;
        if (header as usize) % REGION_ALIGN != 0 {
            return Err(MailboxError::invalid("mailbox region is not properly aligned"));
        }
        if shm.size() < header_span() {
            return Err(MailboxError::invalid(format!(
                "mailbox region of {} bytes cannot hold the {} byte header",
                shm.size(),
                header_span()
            )));
        }
        Ok(Self { shm, header })
    }

    #[inline]
    pub(crate) fn header(&self) -> &RegionHeader {
        // Safety: checked for size and alignment in `new`; the backend keeps
        // the mapping alive for as long as `self.shm` is held.
        unsafe { &*self.header }
    }

    /// Whether the region already carries this exact layout from an earlier
    /// format, so it can be reused without zeroing.
    pub fn layout_matches(&self, capacities: &[u32; CHANNEL_COUNT]) -> bool {
        let Ok(placements) = plan_layout(capacities) else {
            return false;
        };
        let header = self.header();
        header.warm_signature.load(Acquire) == WARM_SIGNATURE
            && header.version == REGION_VERSION
            && header.channel_count == CHANNEL_COUNT as u32
            && header
                .channels
                .iter()
                .zip(placements.iter())
                .all(|(ctl, p)| ctl.segment_offset == p.offset && ctl.segment_length == p.length)
    }

    /// Write the header for `capacities`. Cursors start at zero and the
    /// ready word is cleared. With `zero`, the whole region is wiped first.
    ///
    /// Must only run while no peer is attached.
    pub fn format(&self, capacities: &[u32; CHANNEL_COUNT], zero: bool) -> Result<()> {
        let placements = plan_layout(capacities)?;
        let needed = required_size(capacities)?;
        if self.shm.size() < needed {
            return Err(MailboxError::invalid(format!(
                "mailbox region of {} bytes is smaller than the {needed} bytes required",
                self.shm.size()
            )));
        }

        unsafe {
            if zero {
                std::ptr::write_bytes(self.shm.as_ptr(), 0, self.shm.size());
            }
            std::ptr::write(
                self.header,
                RegionHeader {
                    device_ready: AtomicU32::new(0),
                    warm_signature: AtomicU32::new(0),
                    version: REGION_VERSION,
                    channel_count: CHANNEL_COUNT as u32,
                    channels: placements.map(|p| ChannelControl::new(p.offset, p.length)),
                },
            );
        }
        self.header().warm_signature.store(WARM_SIGNATURE, Release);

        tracing::debug!(size = needed, zeroed = zero, "formatted mailbox region");
        Ok(())
    }

    /// Check a region formatted by the other side before using it.
    pub fn validate(&self) -> Result<()> {
        let header = self.header();
        if header.warm_signature.load(Acquire) != WARM_SIGNATURE {
            return Err(MailboxError::invalid(
                "mailbox region is not formatted - missing signature",
            ));
        }
        if header.version != REGION_VERSION {
            return Err(MailboxError::invalid(format!(
                "mailbox region version {} != {REGION_VERSION}",
                header.version
            )));
        }
        if header.channel_count != CHANNEL_COUNT as u32 {
            return Err(MailboxError::invalid(format!(
                "mailbox region has {} channels, expected {CHANNEL_COUNT}",
                header.channel_count
            )));
        }

        let mut floor = header_span();
        for (id, ctl) in ChannelId::ALL.iter().zip(header.channels.iter()) {
            validate_segment_length(ctl.segment_length, MIN_CHANNEL_CAPACITY)
                .map_err(|e| MailboxError::invalid(format!("channel {id}: {e}")))?;
            let start = ctl.segment_offset as usize;
            let end = start + ctl.segment_length as usize;
            if start % SEGMENT_ALIGN != 0 || start < floor || end > self.shm.size() {
                return Err(MailboxError::invalid(format!(
                    "channel {id}: segment {start}..{end} is misplaced"
                )));
            }
            floor = end;
        }
        Ok(())
    }

    /// Build the ring view for `channel`.
    pub fn channel(&self, channel: ChannelId) -> Result<ChannelRing> {
        let ctl = &self.header().channels[channel.index()];
        let end = ctl.segment_offset as usize + ctl.segment_length as usize;
        if end > self.shm.size() {
            return Err(MailboxError::invalid(format!(
                "channel {channel}: segment ends at {end}, past the region"
            )));
        }
        unsafe {
            let base = self.shm.as_ptr().add(ctl.segment_offset as usize);
            ChannelRing::new(ctl, base)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Core::SharedMemory::HeapMemory;
    use crate::MBOX::channel::DEFAULT_CAPACITIES;

    fn heap(size: usize) -> Arc<dyn SharedMemoryBackend> {
        Arc::new(HeapMemory::new(size).unwrap())
    }

    #[test]
    fn offsets_accumulate_through_table() {
        let placements = plan_layout(&[1024, 128, 256, 128]).unwrap();
        let base = header_span() as u32;
        assert_eq!(placements[0], SegmentPlacement { offset: base, length: 1024 });
        assert_eq!(placements[1].offset, base + 1024);
        assert_eq!(placements[2].offset, base + 1024 + 128);
        assert_eq!(placements[3].offset, base + 1024 + 128 + 256);
        assert_eq!(
            required_size(&[1024, 128, 256, 128]).unwrap(),
            (base + 1024 + 128 + 256 + 128) as usize
        );
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        let err = plan_layout(&[1024, 1000, 1024, 1024]).unwrap_err();
        assert!(matches!(err, MailboxError::InvalidArgument(_)));
        assert!(plan_layout(&[1024, 32, 1024, 1024]).is_err());
    }

    #[test]
    fn rejects_rings_too_small_for_padding() {
        // 64 bytes holds one message, but not from every cursor position.
        let err = plan_layout(&[1024, 64, 1024, 1024]).unwrap_err();
        assert!(matches!(err, MailboxError::InvalidArgument(_)));
        assert!(plan_layout(&[128, 128, 128, 128]).is_ok());

        let size = required_size(&DEFAULT_CAPACITIES).unwrap();
        let region = Region::new(heap(size)).unwrap();
        region.format(&DEFAULT_CAPACITIES, true).unwrap();
        unsafe {
            (*region.header).channels[3].segment_length = 64;
        }
        assert!(region.validate().is_err());
    }

    #[test]
    fn format_then_validate() {
        let size = required_size(&DEFAULT_CAPACITIES).unwrap();
        let region = Region::new(heap(size)).unwrap();
        assert!(region.validate().is_err());
        assert!(!region.layout_matches(&DEFAULT_CAPACITIES));

        region.format(&DEFAULT_CAPACITIES, true).unwrap();
        region.validate().unwrap();
        assert!(region.layout_matches(&DEFAULT_CAPACITIES));
        assert_eq!(region.used_memory(), size);
        assert_eq!(region.capacities(), DEFAULT_CAPACITIES);
        assert!(format!("{region:?}").contains("formatted: true"));
        assert!(!region.layout_matches(&[1024, 1024, 1024, 1024]));

        for id in ChannelId::ALL {
            let ring = region.channel(id).unwrap();
            assert_eq!(ring.segment_length(), DEFAULT_CAPACITIES[id.index()]);
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn format_refuses_small_region() {
        let region = Region::new(heap(header_span() + 1024)).unwrap();
        assert!(region.format(&DEFAULT_CAPACITIES, true).is_err());
    }

    #[test]
    fn validate_catches_tampered_length() {
        let size = required_size(&DEFAULT_CAPACITIES).unwrap();
        let region = Region::new(heap(size)).unwrap();
        region.format(&DEFAULT_CAPACITIES, true).unwrap();
        unsafe {
            (*region.header).channels[1].segment_length = 3000;
        }
        assert!(region.validate().is_err());
        assert!(region.channel(ChannelId::HostToFirmwareHigh).is_err());
    }
}
