//!
//! This module provides syscall definitions and the necessary resources to parse incoming
//! syscalls

pub use ::syscall::error;

pub use self::{process::*, shm::*, usercopy::UserSlice};

use self::error::{Error, Result, ENOSYS};
use crate::context::ProcessId;
use crate::Kernel;

/// Debug
pub mod debug;

/// Process syscalls
pub mod process;

/// Shared-page syscalls
pub mod shm;

/// Copying memory between user and kernel memory
pub mod usercopy;

pub mod number {
    pub const SYS_EXIT: usize = 2;
    pub const SYS_GETPID: usize = 11;
    pub const SYS_SBRK: usize = 12;
    pub const SYS_MAP_SHARED_PAGES: usize = 22;
    pub const SYS_UNMAP_SHARED_PAGES: usize = 23;
    pub const SYS_GETPPID: usize = 24;
}

use self::number::*;

/// Returned by calls whose contract is a single all-ones failure value rather than `-errno`
pub const FAILURE: usize = usize::MAX;

/// This function is the syscall handler of the kernel, it is composed of an inner function
/// that returns a `Result<usize>`. After the inner function runs, the result is folded into
/// a register value.
///
/// `caller` is the process the call was trapped from.
#[must_use]
pub fn syscall(
    kernel: &Kernel,
    caller: ProcessId,
    a: usize,
    b: usize,
    c: usize,
    d: usize,
    e: usize,
) -> usize {
    #[inline(always)]
    fn inner(
        kernel: &Kernel,
        caller: ProcessId,
        a: usize,
        b: usize,
        c: usize,
        d: usize,
        e: usize,
    ) -> Result<usize> {
        match a {
            SYS_MAP_SHARED_PAGES => {
                sys_map_shared_pages(kernel, ProcessId::from(b), ProcessId::from(c), d, e)
            }
            SYS_UNMAP_SHARED_PAGES => sys_unmap_shared_pages(kernel, caller, b, c).map(|()| 0),
            SYS_SBRK => sys_sbrk(kernel, caller, b as isize),
            SYS_GETPID => sys_getpid(kernel, caller).map(ProcessId::into),
            SYS_GETPPID => sys_getppid(kernel, caller).map(ProcessId::into),
            SYS_EXIT => sys_exit(kernel, caller, b as i32).map(|()| 0),
            _ => Err(Error::new(ENOSYS)),
        }
    }

    debug::debug_start(caller, [a, b, c, d, e]);

    let result = inner(kernel, caller, a, b, c, d, e);

    debug::debug_end(caller, [a, b, c, d, e], &result);

    match a {
        SYS_MAP_SHARED_PAGES | SYS_SBRK => result.unwrap_or(FAILURE),
        // errormux turns Result<usize> into -errno
        _ => Error::mux(result),
    }
}
