use super::*;
use crate::MBOX::Ring::layout::DEVICE_READY_SIGNATURE;

/// Read-only accessors on the region, mostly for diagnostics.
impl Region {
    /// The backend holding the region.
    pub fn shm(&self) -> &Arc<dyn SharedMemoryBackend> {
        &self.shm
    }

    /// Raw pointer to the region header.
    pub fn header_ptr(&self) -> *const RegionHeader {
        self.header
    }

    /// Size of the backing memory in bytes.
    pub fn size(&self) -> usize {
        self.shm.size()
    }

    /// Bytes covered by the header and every configured segment.
    pub fn used_memory(&self) -> usize {
        self.header()
            .channels
            .iter()
            .map(|ctl| ctl.segment_offset as usize + ctl.segment_length as usize)
            .fold(header_span(), usize::max)
    }

    /// Ring capacities as stored in the header, in table order.
    pub fn capacities(&self) -> [u32; CHANNEL_COUNT] {
        let channels = &self.header().channels;
        std::array::from_fn(|i| channels[i].segment_length)
    }

    /// The host has formatted this region at least once.
    pub fn is_formatted(&self) -> bool {
        self.header().warm_signature.load(Acquire) == WARM_SIGNATURE
    }

    /// The firmware has published its ready signature.
    pub fn is_device_ready(&self) -> bool {
        self.header().device_ready.load(Acquire) == DEVICE_READY_SIGNATURE
    }
}
