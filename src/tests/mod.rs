//! End-to-end scenarios driven through the syscall entry point, the way user programs see the
//! kernel.

use std::thread;

use test_log::test;

use crate::context::{self, ProcessId};
use crate::paging::VirtualAddress;
use crate::syscall::error::Result;
use crate::syscall::number::*;
use crate::syscall::{syscall, FAILURE};
use crate::{Kernel, KernelConfig, PAGE_SIZE};

fn kernel(frame_count: usize) -> Kernel {
    Kernel::new(KernelConfig {
        frame_count,
        ..KernelConfig::default()
    })
}

fn sbrk(kernel: &Kernel, pid: ProcessId, n: isize) -> usize {
    syscall(kernel, pid, SYS_SBRK, n as usize, 0, 0, 0)
}

fn map(
    kernel: &Kernel,
    caller: ProcessId,
    src: ProcessId,
    dst: ProcessId,
    addr: usize,
    size: usize,
) -> usize {
    syscall(kernel, caller, SYS_MAP_SHARED_PAGES, src.get(), dst.get(), addr, size)
}

fn unmap(kernel: &Kernel, caller: ProcessId, addr: usize, size: usize) -> usize {
    syscall(kernel, caller, SYS_UNMAP_SHARED_PAGES, addr, size, 0, 0)
}

fn exit(kernel: &Kernel, pid: ProcessId) {
    assert_eq!(syscall(kernel, pid, SYS_EXIT, 0, 0, 0, 0), 0);
}

fn write(kernel: &Kernel, pid: ProcessId, addr: usize, data: &[u8]) -> Result<()> {
    context::process(kernel, pid)?.lock().addr_space.copy_out(kernel.memory(), addr, data)
}

fn read(kernel: &Kernel, pid: ProcessId, addr: usize, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0; len];
    context::process(kernel, pid)?.lock().addr_space.copy_in(kernel.memory(), addr, &mut buf)?;
    Ok(buf)
}

/// Share counts of the frames backing `[addr, addr + len)` of `pid`, one per page
fn counts(kernel: &Kernel, pid: ProcessId, addr: usize, len: usize) -> Vec<usize> {
    let process_lock = context::process(kernel, pid).unwrap();
    let process = process_lock.lock();
    (addr / PAGE_SIZE * PAGE_SIZE..addr + len)
        .step_by(PAGE_SIZE)
        .map(|va| {
            let physical = process.addr_space.translate(VirtualAddress::new(va)).unwrap();
            kernel.refs().count(crate::memory::Frame::containing(physical))
        })
        .collect()
}

fn size(kernel: &Kernel, pid: ProcessId) -> usize {
    sbrk(kernel, pid, 0)
}

#[test]
fn writes_are_visible_both_ways() {
    let kernel = kernel(64);
    let src = kernel.spawn(None, "src").unwrap();
    let dst = kernel.spawn(Some(src), "dst").unwrap();
    sbrk(&kernel, src, 2 * PAGE_SIZE as isize);
    sbrk(&kernel, dst, 100);
    write(&kernel, src, 0x10, b"hello child").unwrap();

    let addr = map(&kernel, dst, src, dst, 0x10, 11);
    assert_ne!(addr, FAILURE);
    assert_eq!(addr, PAGE_SIZE + 0x10);
    assert_eq!(read(&kernel, dst, addr, 11).unwrap(), b"hello child");

    write(&kernel, dst, addr, b"hello daddy").unwrap();
    assert_eq!(read(&kernel, src, 0x10, 11).unwrap(), b"hello daddy");
}

#[test]
fn map_then_unmap_restores_size_and_counts() {
    let kernel = kernel(64);
    let src = kernel.spawn(None, "src").unwrap();
    let dst = kernel.spawn(Some(src), "dst").unwrap();
    sbrk(&kernel, src, 3 * PAGE_SIZE as isize);
    sbrk(&kernel, dst, 123);
    let free_before = kernel.free_frames();

    let addr = map(&kernel, dst, src, dst, PAGE_SIZE - 8, PAGE_SIZE);
    assert_ne!(addr, FAILURE);
    assert_eq!(size(&kernel, dst), 3 * PAGE_SIZE);
    assert_eq!(counts(&kernel, src, PAGE_SIZE - 8, PAGE_SIZE), [2, 2]);

    assert_eq!(unmap(&kernel, dst, addr, PAGE_SIZE), 0);
    assert_eq!(size(&kernel, dst), 123);
    assert_eq!(counts(&kernel, src, PAGE_SIZE - 8, PAGE_SIZE), [1, 1]);
    assert_eq!(kernel.free_frames(), free_before);
}

#[test]
fn range_straddling_a_page_boundary_maps_two_pages() {
    let kernel = kernel(64);
    let src = kernel.spawn(None, "src").unwrap();
    let dst = kernel.spawn(None, "dst").unwrap();
    sbrk(&kernel, src, 2 * PAGE_SIZE as isize);
    write(&kernel, src, PAGE_SIZE - 1, b"ab").unwrap();

    let addr = map(&kernel, dst, src, dst, PAGE_SIZE - 1, 2);
    assert_eq!(addr % PAGE_SIZE, PAGE_SIZE - 1);
    assert_eq!(size(&kernel, dst), 2 * PAGE_SIZE);
    assert_eq!(read(&kernel, dst, addr, 2).unwrap(), b"ab");
}

#[test]
fn destinations_exiting_without_unmap_release_their_shares() {
    let kernel = kernel(128);
    let src = kernel.spawn(None, "src").unwrap();
    sbrk(&kernel, src, 2 * PAGE_SIZE as isize);
    write(&kernel, src, 0, b"shared").unwrap();
    let free_before = kernel.free_frames();

    let destinations = (0..4)
        .map(|i| kernel.spawn(Some(src), format!("dst{i}")).unwrap())
        .collect::<Vec<_>>();
    for &dst in &destinations {
        assert_ne!(map(&kernel, dst, src, dst, 0, 2 * PAGE_SIZE), FAILURE);
    }
    assert_eq!(counts(&kernel, src, 0, 2 * PAGE_SIZE), [5, 5]);

    for &dst in &destinations {
        exit(&kernel, dst);
    }

    assert_eq!(counts(&kernel, src, 0, 2 * PAGE_SIZE), [1, 1]);
    assert_eq!(read(&kernel, src, 0, 6).unwrap(), b"shared");
    assert_eq!(kernel.free_frames(), free_before);
}

#[test]
fn exit_cleanup_matches_explicit_unmap() {
    let kernel = kernel(64);
    let src = kernel.spawn(None, "src").unwrap();
    sbrk(&kernel, src, 3 * PAGE_SIZE as isize);

    let unmapper = kernel.spawn(Some(src), "unmapper").unwrap();
    let addr = map(&kernel, unmapper, src, unmapper, 0, 3 * PAGE_SIZE);
    assert_eq!(unmap(&kernel, unmapper, addr, 3 * PAGE_SIZE), 0);
    let after_unmap = counts(&kernel, src, 0, 3 * PAGE_SIZE);

    let exiter = kernel.spawn(Some(src), "exiter").unwrap();
    assert_ne!(map(&kernel, exiter, src, exiter, 0, 3 * PAGE_SIZE), FAILURE);
    exit(&kernel, exiter);

    assert_eq!(counts(&kernel, src, 0, 3 * PAGE_SIZE), after_unmap);
}

#[test]
fn source_exiting_first_keeps_frames_alive() {
    let kernel = kernel(64);
    let src = kernel.spawn(None, "src").unwrap();
    let dst = kernel.spawn(Some(src), "dst").unwrap();
    let free_start = kernel.free_frames();
    sbrk(&kernel, src, PAGE_SIZE as isize);
    write(&kernel, src, 0, b"survivor").unwrap();
    let addr = map(&kernel, dst, src, dst, 0, 8);

    exit(&kernel, src);
    assert_eq!(read(&kernel, dst, addr, 8).unwrap(), b"survivor");
    assert_eq!(counts(&kernel, dst, addr, 8), [1]);

    exit(&kernel, dst);
    assert_eq!(kernel.free_frames(), free_start);
    assert_eq!(kernel.refs().referenced_frames(), 0);
}

#[test]
fn invalid_process_fails_without_touching_destination() {
    let kernel = kernel(64);
    let dst = kernel.spawn(None, "dst").unwrap();
    sbrk(&kernel, dst, 10);

    assert_eq!(map(&kernel, dst, ProcessId::new(999), dst, 0, 10), FAILURE);
    assert_eq!(size(&kernel, dst), 10);

    // An unmapped source range also fails as a whole.
    let src = kernel.spawn(None, "src").unwrap();
    sbrk(&kernel, src, PAGE_SIZE as isize);
    assert_eq!(map(&kernel, dst, src, dst, 0, 2 * PAGE_SIZE), FAILURE);
    assert_eq!(size(&kernel, dst), 10);
}

#[test]
fn bad_unmap_leaves_space_untouched() {
    let kernel = kernel(64);
    let src = kernel.spawn(None, "src").unwrap();
    let dst = kernel.spawn(None, "dst").unwrap();
    sbrk(&kernel, src, 2 * PAGE_SIZE as isize);
    let addr = map(&kernel, dst, src, dst, 0, 2 * PAGE_SIZE);

    // Wrong size, wrong start, and a window that is not at the top.
    assert_ne!(unmap(&kernel, dst, addr, PAGE_SIZE), 0);
    assert_ne!(unmap(&kernel, dst, addr + PAGE_SIZE, PAGE_SIZE), 0);
    sbrk(&kernel, dst, PAGE_SIZE as isize);
    assert_ne!(unmap(&kernel, dst, addr, 2 * PAGE_SIZE), 0);

    assert_eq!(size(&kernel, dst), 3 * PAGE_SIZE);
    assert_eq!(counts(&kernel, src, 0, 2 * PAGE_SIZE), [2, 2]);
    assert!(read(&kernel, dst, addr, 2 * PAGE_SIZE).is_ok());

    sbrk(&kernel, dst, -(PAGE_SIZE as isize));
    assert_eq!(unmap(&kernel, dst, addr, 2 * PAGE_SIZE), 0);
    assert_eq!(size(&kernel, dst), 0);
}

#[test]
fn concurrent_maps_from_one_source() {
    let kernel = kernel(256);
    let src = kernel.spawn(None, "src").unwrap();
    sbrk(&kernel, src, 8 * PAGE_SIZE as isize);
    let a = kernel.spawn(Some(src), "a").unwrap();
    let b = kernel.spawn(Some(src), "b").unwrap();

    thread::scope(|scope| {
        let kernel = &kernel;
        for (dst, base) in [(a, 0), (b, 4 * PAGE_SIZE)] {
            scope.spawn(move || {
                for _ in 0..100 {
                    let addr = map(kernel, dst, src, dst, base, 4 * PAGE_SIZE);
                    assert_eq!(addr, 0);
                    assert_eq!(unmap(kernel, dst, addr, 4 * PAGE_SIZE), 0);
                }
                assert_ne!(map(kernel, dst, src, dst, base, 4 * PAGE_SIZE), FAILURE);
            });
        }
    });

    assert_eq!(counts(&kernel, src, 0, 8 * PAGE_SIZE), [2; 8]);
    assert_eq!(counts(&kernel, a, 0, 4 * PAGE_SIZE), [2; 4]);
    assert_eq!(counts(&kernel, b, 0, 4 * PAGE_SIZE), [2; 4]);
}

#[test]
fn concurrent_maps_in_opposite_directions_do_not_deadlock() {
    let kernel = kernel(256);
    let a = kernel.spawn(None, "a").unwrap();
    let b = kernel.spawn(None, "b").unwrap();
    sbrk(&kernel, a, PAGE_SIZE as isize);
    sbrk(&kernel, b, PAGE_SIZE as isize);

    thread::scope(|scope| {
        let kernel = &kernel;
        for (src, dst) in [(a, b), (b, a)] {
            scope.spawn(move || {
                for _ in 0..100 {
                    let addr = map(kernel, dst, src, dst, 0, PAGE_SIZE);
                    assert_ne!(addr, FAILURE);
                    assert_eq!(unmap(kernel, dst, addr, PAGE_SIZE), 0);
                }
            });
        }
    });

    assert_eq!(counts(&kernel, a, 0, PAGE_SIZE), [1]);
    assert_eq!(counts(&kernel, b, 0, PAGE_SIZE), [1]);
}

#[test]
fn installed_kernel_log_records_windows() {
    let kernel = Kernel::with_logger(
        KernelConfig {
            frame_count: 16,
            ..KernelConfig::default()
        },
        ::log::LevelFilter::Debug,
    );
    let src = kernel.spawn(None, "src").unwrap();
    let dst = kernel.spawn(None, "dst").unwrap();
    sbrk(&kernel, src, PAGE_SIZE as isize);
    assert_ne!(map(&kernel, dst, src, dst, 0, 8), FAILURE);

    // Whichever test installs a logger first owns it for the whole run.
    let log = String::from_utf8_lossy(&kernel.log_contents()).into_owned();
    if log.contains("Logger initialized.") {
        assert!(log.contains("installed 1 shared pages"), "{log}");
    }
}
