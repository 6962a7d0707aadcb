// Shared memory backend tests
// Run with: cargo test --test shared_memory -- --nocapture

use mbox_ring::Core::{heap_memory, RawHandle, SharedMemoryBackend};

#[test]
fn test_heap_memory() {
    let shm = heap_memory(8192).unwrap();
    assert_eq!(shm.size(), 8192);
    assert_eq!(shm.raw_handle(), RawHandle::Heap);
    assert_eq!(shm.as_ptr() as usize % 128, 0);

    unsafe {
        let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), shm.size());
        assert!(slice.iter().all(|b| *b == 0));
        slice[4096] = 0x42;
        assert_eq!(slice[4096], 0x42);
    }
}

#[cfg(target_os = "linux")]
mod linux_tests {
    use mbox_ring::Core::{attach_shared_memory, create_shared_memory, RawHandle};
    use mbox_ring::MBOX::{BootKind, ChannelId, MailboxBuilder};
    use mbox_ring::MBOX::Structs::Command;
    use serial_test::serial;
    use std::io;
    use std::time::Duration;

    fn cleanup(name: &str) {
        let _ = std::fs::remove_file(format!("/dev/shm/{name}"));
    }

    #[test]
    fn test_create_shared_memory() {
        let size = 4096;
        let shm = create_shared_memory(size, Some("mbox_test_create")).unwrap();

        assert_eq!(shm.size(), size);
        assert!(!shm.as_ptr().is_null());
        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd > 0, "File descriptor should be positive"),
            RawHandle::Heap => panic!("expected a file-backed mapping"),
        }

        unsafe {
            let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), size);
            assert!(slice.iter().all(|b| *b == 0), "Fresh region should be zeroed");
            slice[0] = 0x42;
            assert_eq!(slice[0], 0x42);
        }
        drop(shm);
        cleanup("mbox_test_create");
    }

    #[test]
    fn test_attach_sees_creator_writes() {
        let name = "mbox_test_attach";
        let creator = create_shared_memory(8192, Some(name)).unwrap();
        let attached = attach_shared_memory(name, 4096).unwrap();

        // Attach maps the whole file, not just the requested minimum.
        assert_eq!(attached.size(), 8192);
        assert_ne!(creator.as_ptr(), attached.as_ptr());

        unsafe {
            creator.as_ptr().add(100).write(0xAB);
            assert_eq!(attached.as_ptr().add(100).read(), 0xAB);
            attached.as_ptr().add(8191).write(0xCD);
            assert_eq!(creator.as_ptr().add(8191).read(), 0xCD);
        }
        drop(attached);
        drop(creator);
        cleanup(name);
    }

    #[test]
    fn test_attach_rejects_missing_or_small_region() {
        let err = attach_shared_memory("mbox_test_missing", 4096).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let name = "mbox_test_small";
        let shm = create_shared_memory(1024, Some(name)).unwrap();
        let err = attach_shared_memory(name, 4096).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        drop(shm);
        cleanup(name);
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = create_shared_memory(0, Some("mbox_test_zero")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        cleanup("mbox_test_zero");
    }

    #[test]
    #[serial]
    fn test_builder_over_dev_shm() {
        let name = "mbox_test_builder";
        cleanup(name);

        let mut firmware = None;
        let mut boot = |_: BootKind| -> io::Result<()> {
            firmware = Some(MailboxBuilder::new().with_region_name(name).build_firmware()?);
            Ok(())
        };
        let host = MailboxBuilder::new()
            .with_region_name(name)
            .with_boot_timeout(Duration::from_secs(2))
            .build_host(&mut boot)
            .unwrap();
        let firmware = firmware.expect("boot hook should have attached the firmware");

        assert_eq!(host.boot_kind(), Some(BootKind::Cold));
        assert!(host.region().is_device_ready());

        let sent = host
            .send(ChannelId::HostToFirmwareHigh, 3, &Command::new([1, 2, 3, 4, 5]))
            .unwrap();
        let (got, cmd) = firmware
            .receive(ChannelId::HostToFirmwareHigh)
            .unwrap()
            .unwrap();
        assert_eq!(got.id, sent.id);
        assert_eq!(cmd.params, [1, 2, 3, 4, 5]);

        firmware.close();
        host.close();
        cleanup(name);
    }
}

#[cfg(not(target_os = "linux"))]
mod non_linux_tests {
    use mbox_ring::Core::{attach_shared_memory, create_shared_memory};

    #[test]
    fn test_unsupported_platform() {
        let result = create_shared_memory(4096, None);
        assert!(result.is_err());

        if let Err(err) = result {
            assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
        }
    }

    #[test]
    fn test_attach_unsupported_platform() {
        let result = attach_shared_memory("test", 4096);
        assert!(result.is_err());

        if let Err(err) = result {
            assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
        }
    }
}
