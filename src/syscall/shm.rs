//! Shared-page syscalls: argument checking and process locking around [`crate::context::shm`].

use crate::context::shm::{self, ShmError, SourceWindow};
use crate::context::{self, ProcessId};
use crate::paging::VirtualAddress;
use crate::sync::{lock_pair, PairGuard};
use crate::syscall::error::Result;
use crate::Kernel;

/// Map `[src_addr, src_addr + size)` of `src_pid` into the top of `dst_pid`, returning the
/// address in `dst_pid` that aliases `src_addr`.
pub fn sys_map_shared_pages(
    kernel: &Kernel,
    src_pid: ProcessId,
    dst_pid: ProcessId,
    src_addr: usize,
    size: usize,
) -> Result<usize> {
    let not_found = |_| ShmError::NotFound;
    let src_lock = context::process(kernel, src_pid).map_err(not_found)?;
    let dst_lock = context::process(kernel, dst_pid).map_err(not_found)?;
    let src_addr = VirtualAddress::new(src_addr);

    let address = match lock_pair(src_pid, &*src_lock, dst_pid, &*dst_lock) {
        PairGuard::Same(mut process) => {
            if !process.is_alive() {
                return Err(ShmError::NotFound.into());
            }
            let window = SourceWindow::resolve(&process.addr_space, src_addr, size)?;
            window.install(&mut process.addr_space, kernel.memory(), kernel.refs())?
        }
        PairGuard::Distinct { first: src, second: mut dst } => {
            if !src.is_alive() || !dst.is_alive() {
                return Err(ShmError::NotFound.into());
            }
            shm::map_shared_pages(
                &src.addr_space,
                &mut dst.addr_space,
                src_addr,
                size,
                kernel.memory(),
                kernel.refs(),
            )?
        }
    };

    Ok(address.data())
}

/// Remove the topmost shared window of the caller's own address space.
pub fn sys_unmap_shared_pages(
    kernel: &Kernel,
    caller: ProcessId,
    addr: usize,
    size: usize,
) -> Result<()> {
    let process_lock = context::process(kernel, caller).map_err(|_| ShmError::NotFound)?;
    let mut process = process_lock.lock();
    if !process.is_alive() {
        return Err(ShmError::NotFound.into());
    }

    let addr = VirtualAddress::new(addr);
    shm::unmap_shared_pages(&mut process.addr_space, addr, size, kernel.memory(), kernel.refs())?;
    Ok(())
}
