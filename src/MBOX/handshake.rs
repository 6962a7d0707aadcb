// Boot handshake: region setup, ready signature exchange, teardown

use std::io;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;

use crate::Core::region::Region;
use crate::error::{MailboxError, Result};
use crate::MBOX::channel::CHANNEL_COUNT;
use crate::MBOX::Ring::layout::DEVICE_READY_SIGNATURE;

/// How the host prepared the region before booting the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootKind {
    /// Region wiped and formatted from scratch.
    Cold,
    /// Region reused as-is; only header and cursors were rewritten.
    Warm,
}

/// The collaborator that actually starts the firmware once the region is
/// ready, e.g. by releasing the co-processor from reset.
pub trait BootControl {
    fn request_boot(&mut self, kind: BootKind) -> io::Result<()>;
}

impl<F> BootControl for F
where
    F: FnMut(BootKind) -> io::Result<()>,
{
    fn request_boot(&mut self, kind: BootKind) -> io::Result<()> {
        self(kind)
    }
}

/// Longest single sleep while polling for the ready signature.
const MAX_POLL_SLEEP: Duration = Duration::from_millis(1);

/// Spin, then sleep, until the firmware publishes its ready signature.
pub fn wait_for_ready(region: &Region, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    let backoff = Backoff::new();
    let ready = &region.header().device_ready;

    loop {
        if ready.load(Acquire) == DEVICE_READY_SIGNATURE {
            return Ok(());
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(MailboxError::Timeout {
                waited_ms: elapsed.as_millis() as u64,
            });
        }
        if backoff.is_completed() {
            thread::sleep(MAX_POLL_SLEEP.min(timeout - elapsed));
        } else {
            backoff.snooze();
        }
    }
}

/// Host side: format the region, boot the firmware and wait for it.
///
/// A warm attempt that times out falls back to one cold attempt.
pub(crate) fn host_boot(
    region: &Region,
    capacities: &[u32; CHANNEL_COUNT],
    boot: &mut dyn BootControl,
    timeout: Duration,
) -> Result<BootKind> {
    let mut kind = if region.layout_matches(capacities) {
        BootKind::Warm
    } else {
        BootKind::Cold
    };

    loop {
        region.format(capacities, kind == BootKind::Cold)?;
        tracing::debug!(?kind, timeout_ms = timeout.as_millis() as u64, "requesting firmware boot");
        boot.request_boot(kind)?;

        match wait_for_ready(region, timeout) {
            Ok(()) => {
                tracing::debug!(?kind, "firmware ready");
                return Ok(kind);
            }
            Err(MailboxError::Timeout { waited_ms }) if kind == BootKind::Warm => {
                tracing::warn!(waited_ms, "warm boot timed out, retrying cold");
                kind = BootKind::Cold;
            }
            Err(err) => {
                tracing::warn!(error = %err, ?kind, "firmware boot failed");
                return Err(err);
            }
        }
    }
}

/// Firmware side: announce readiness. The layout must already be validated.
pub(crate) fn announce_ready(region: &Region) {
    region
        .header()
        .device_ready
        .store(DEVICE_READY_SIGNATURE, Release);
    tracing::debug!("firmware published ready signature");
}

/// Either side: withdraw the ready signature. With `invalidate`, also drop
/// the warm signature so the next host open boots cold.
pub(crate) fn teardown(region: &Region, invalidate: bool) {
    let header = region.header();
    header.device_ready.store(0, Release);
    if invalidate {
        header.warm_signature.store(0, Release);
    }
    tracing::debug!(invalidate, "mailbox region torn down");
}
