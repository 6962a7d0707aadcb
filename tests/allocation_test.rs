// Allocation tracking for the ring hot path
//
// Tests using dhat are marked with #[serial_test::serial] because dhat only
// allows one profiler to run at a time.
//
// Run:
//   cargo test --test allocation_test -- --nocapture

use mbox_ring::Core::{HeapMemory, SharedMemoryBackend};
use mbox_ring::MBOX::Ring::layout::ChannelControl;
use mbox_ring::MBOX::Ring::ChannelRing;
use mbox_ring::MBOX::Structs::{Command, Message};
use mbox_ring::MBOX::{BootKind, ChannelId, Mailbox, MailboxConfig};
use std::io;
use std::sync::Arc;

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn command(seed: u32) -> Command {
    Command::new([seed; 5])
}

#[test]
#[serial_test::serial]
fn ring_put_take_does_not_allocate() {
    let _profiler = dhat::Profiler::builder().testing().build();

    let capacity = 1024;
    let backing = HeapMemory::new(capacity as usize).unwrap();
    let control = ChannelControl::new(0, capacity);
    let ring = unsafe { ChannelRing::new(&control, backing.as_ptr()).unwrap() };

    // Warm up so lazily registered log callsites are out of the picture.
    let mut message = Message::new(0, 1);
    ring.put(&mut message, &command(0)).unwrap();
    ring.take().unwrap().unwrap();

    let before = dhat::HeapStats::get();
    for id in 1..=1000 {
        let mut message = Message::new(id, 1);
        ring.put(&mut message, &command(id)).unwrap();
        let (got, cmd) = ring.take().unwrap().unwrap();
        assert_eq!(got.id, id);
        assert_eq!(cmd.params[0], id);
    }
    let after = dhat::HeapStats::get();

    println!(
        "blocks before: {}, after: {}",
        before.total_blocks, after.total_blocks
    );
    assert_eq!(after.total_blocks, before.total_blocks);
}

#[test]
#[serial_test::serial]
fn out_of_order_clear_does_not_allocate() {
    let _profiler = dhat::Profiler::builder().testing().build();

    let capacity = 4096;
    let backing = HeapMemory::new(capacity as usize).unwrap();
    let control = ChannelControl::new(0, capacity);
    let ring = unsafe { ChannelRing::new(&control, backing.as_ptr()).unwrap() };

    let mut message = Message::new(0, 1);
    ring.put(&mut message, &command(0)).unwrap();
    let head = ring.peek().unwrap().unwrap();
    ring.clear(&head).unwrap();

    let before = dhat::HeapStats::get();
    for round in 0..200 {
        let mut a = Message::new(round, 1);
        let mut b = Message::new(round, 2);
        ring.put(&mut a, &command(round)).unwrap();
        ring.put(&mut b, &command(round)).unwrap();

        let first = ring.reference(None).unwrap().unwrap();
        let second = ring.reference(Some(&first)).unwrap().unwrap();
        ring.clear(&second).unwrap();
        ring.clear(&first).unwrap();
        assert!(ring.is_empty());
    }
    let after = dhat::HeapStats::get();
    assert_eq!(after.total_blocks, before.total_blocks);
}

#[test]
#[serial_test::serial]
fn mailbox_send_receive_allocation_profile() {
    let _profiler = dhat::Profiler::builder().testing().build();

    let config = MailboxConfig::default();
    let shm: Arc<dyn SharedMemoryBackend> =
        Arc::new(HeapMemory::new(config.region_size().unwrap()).unwrap());

    let mut firmware = None;
    let mut boot = |_: BootKind| -> io::Result<()> {
        firmware = Some(Mailbox::open_firmware(Arc::clone(&shm))?);
        Ok(())
    };
    let host = Mailbox::open_host(Arc::clone(&shm), &config, &mut boot).unwrap();
    let firmware = firmware.unwrap();
    let setup = dhat::HeapStats::get();
    println!(
        "setup: {} blocks, {} bytes at peak",
        setup.total_blocks, setup.max_bytes
    );

    host.send(ChannelId::HostToFirmwareLow, 1, &command(0)).unwrap();
    firmware.receive(ChannelId::HostToFirmwareLow).unwrap().unwrap();

    let before = dhat::HeapStats::get();
    for i in 0..1000 {
        host.send(ChannelId::HostToFirmwareLow, 1, &command(i)).unwrap();
        let (message, _) = firmware
            .receive(ChannelId::HostToFirmwareLow)
            .unwrap()
            .unwrap();
        let mut reply = Message::new(message.id, 2);
        firmware
            .put(ChannelId::FirmwareToHostLow, &mut reply, &command(i))
            .unwrap();
        host.receive(ChannelId::FirmwareToHostLow).unwrap().unwrap();
    }
    let after = dhat::HeapStats::get();
    assert_eq!(after.total_blocks, before.total_blocks);

    firmware.close();
    host.close();
}
