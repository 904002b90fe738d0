//! # Context management
//!
//! Processes, their address spaces, and the shared-window machinery operating on them.

use alloc::sync::Arc;

use spinning_top::Spinlock;

use crate::syscall::error::{Error, Result, ESRCH};
use crate::Kernel;

pub use self::list::ProcessList;
pub use self::memory::{AddrSpace, SharedWindow};
pub use self::process::{Process, ProcessId, Status};

/// Process list
mod list;

/// Address spaces
pub mod memory;

/// Process struct
pub mod process;

/// Shared windows between address spaces
pub mod shm;

/// Look up a live process.
pub fn process(kernel: &Kernel, pid: ProcessId) -> Result<Arc<Spinlock<Process>>> {
    kernel
        .processes()
        .read()
        .get(pid)
        .cloned()
        .ok_or(Error::new(ESRCH))
}

/// Terminate a process: drop its shared windows, then the rest of its address space, and
/// remove it from the process list.
///
/// Anyone still holding the process handle sees it as exited once they get its lock.
pub fn exit(kernel: &Kernel, pid: ProcessId, status: i32) -> Result<()> {
    // Unlist first, so that no new lookup can find a process being torn down.
    let process_lock = kernel.processes().write().remove(pid).ok_or(Error::new(ESRCH))?;
    let mut process = process_lock.lock();

    let reclaimed =
        shm::reclaim_shared_pages(&mut process.addr_space, kernel.memory(), kernel.refs());
    process.addr_space.destroy(kernel.memory(), kernel.refs());
    process.status = Status::Exited(status);

    log::debug!(
        "{pid} ({}) exited with {status}, {reclaimed} shared pages reclaimed",
        process.name
    );
    Ok(())
}
