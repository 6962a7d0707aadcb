// In demos/loopback.rs
//
// Host and firmware in one process over a heap-backed region. The firmware
// thread acknowledges requests in reverse batch order and answers each one.
//
//   cargo run --example loopback -- 10000
use mbox_ring::Core::{HeapMemory, SharedMemoryBackend};
use mbox_ring::MBOX::Structs::{Command, Message};
use mbox_ring::MBOX::{BootKind, ChannelId, Mailbox, MailboxConfig};
use std::env;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const KIND_REQUEST: u32 = 0x01;
const KIND_REPLY: u32 = 0x81;

fn firmware_loop(firmware: Mailbox, total: u32) -> io::Result<()> {
    let inbound = ChannelId::HostToFirmwareLow;
    let outbound = ChannelId::FirmwareToHostLow;
    let mut answered = 0;
    let mut batch = Vec::with_capacity(16);

    while answered < total {
        batch.clear();
        let mut previous = None;
        while let Some(message) = firmware.reference(inbound, previous.as_ref())? {
            let command = firmware.get_command(inbound, &message)?;
            batch.push((message, command));
            previous = Some(message);
        }
        if batch.is_empty() {
            thread::yield_now();
            continue;
        }

        for (request, command) in batch.iter().rev() {
            let mut params = command.params;
            params[1] = params[0].wrapping_mul(2);
            let mut reply = Message::new(request.id, KIND_REPLY);
            loop {
                match firmware.put(outbound, &mut reply, &Command::new(params)) {
                    Ok(()) => break,
                    Err(e) if e.is_retryable() => thread::sleep(Duration::from_micros(10)),
                    Err(e) => return Err(e.into()),
                }
            }
            firmware.clear(inbound, request)?;
            answered += 1;
        }
    }

    tracing::info!(answered, "firmware done");
    firmware.close();
    Ok(())
}

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let total: u32 = match env::args().nth(1) {
        Some(arg) => arg
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{arg}: {e}")))?,
        None => 10_000,
    };

    let config = MailboxConfig::default();
    let shm: Arc<dyn SharedMemoryBackend> = Arc::new(HeapMemory::new(config.region_size()?)?);

    let mut firmware = None;
    let mut boot = |kind: BootKind| -> io::Result<()> {
        tracing::info!(?kind, "booting firmware");
        firmware = Some(Mailbox::open_firmware(Arc::clone(&shm))?);
        Ok(())
    };
    let host = Mailbox::open_host(Arc::clone(&shm), &config, &mut boot)?;
    let firmware = firmware
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "firmware never attached"))?;

    let worker = thread::spawn(move || firmware_loop(firmware, total));

    let start = Instant::now();
    let mut sent = 0;
    let mut received = 0;
    while received < total {
        if sent < total {
            let request = Command::new([sent, 0, 0, 0, 0]);
            match host.send(ChannelId::HostToFirmwareLow, KIND_REQUEST, &request) {
                Ok(_) => sent += 1,
                Err(e) if e.is_retryable() => {}
                Err(e) => return Err(e.into()),
            }
        }
        if let Some((reply, command)) = host.receive(ChannelId::FirmwareToHostLow)? {
            let expected = command.params[0].wrapping_mul(2);
            if command.params[1] != expected || reply.id != command.params[0] {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad reply {reply:?} / {command:?}"),
                ));
            }
            received += 1;
        }
    }
    let elapsed = start.elapsed();

    worker
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "firmware thread panicked"))??;

    println!("{}", host.dump()?);
    println!(
        "Loopback: {total} round trips in {elapsed:.2?} ({:.0} msg/s)",
        total as f64 / elapsed.as_secs_f64()
    );
    host.close();
    Ok(())
}
