//! Process syscalls

use crate::context::{self, ProcessId};
use crate::syscall::error::{Error, Result, ESRCH};
use crate::Kernel;

/// Grow or shrink the caller's address space by `n` bytes, returning its previous size.
/// `sbrk(0)` reports the current size, shared windows included.
pub fn sys_sbrk(kernel: &Kernel, caller: ProcessId, n: isize) -> Result<usize> {
    let process_lock = context::process(kernel, caller)?;
    let mut process = process_lock.lock();
    if !process.is_alive() {
        return Err(Error::new(ESRCH));
    }
    process.addr_space.grow(n, kernel.memory(), kernel.refs())
}

pub fn sys_getpid(kernel: &Kernel, caller: ProcessId) -> Result<ProcessId> {
    Ok(context::process(kernel, caller)?.lock().pid)
}

pub fn sys_getppid(kernel: &Kernel, caller: ProcessId) -> Result<ProcessId> {
    context::process(kernel, caller)?.lock().ppid.ok_or(Error::new(ESRCH))
}

pub fn sys_exit(kernel: &Kernel, caller: ProcessId, status: i32) -> Result<()> {
    context::exit(kernel, caller, status)
}
