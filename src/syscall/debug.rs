use alloc::string::String;

use super::number::*;
use crate::context::ProcessId;
use crate::syscall::error::Result;

pub fn format_call(a: usize, b: usize, c: usize, d: usize, e: usize) -> String {
    match a {
        SYS_MAP_SHARED_PAGES => format!("map_shared_pages({}, {}, {:#X}, {})", b, c, d, e),
        SYS_UNMAP_SHARED_PAGES => format!("unmap_shared_pages({:#X}, {})", b, c),
        SYS_SBRK => format!("sbrk({})", b as isize),
        SYS_GETPID => String::from("getpid()"),
        SYS_GETPPID => String::from("getppid()"),
        SYS_EXIT => format!("exit({})", b as i32),
        _ => format!("UNKNOWN{} {} ({:#X}, {:#X}, {:#X}, {:#X})", a, a, b, c, d, e),
    }
}

#[cfg(feature = "syscall_debug")]
pub fn debug_start(caller: ProcessId, [a, b, c, d, e]: [usize; 5]) {
    // Format outside the log call so the logger lock is never held while formatting
    let string = format_call(a, b, c, d, e);
    log::debug!("{}: {}", caller, string);
}
#[cfg(feature = "syscall_debug")]
pub fn debug_end(caller: ProcessId, [a, b, c, d, e]: [usize; 5], result: &Result<usize>) {
    let string = format_call(a, b, c, d, e);
    match result {
        Ok(ok) => log::debug!("{}: {} = Ok({} ({:#X}))", caller, string, ok, ok),
        Err(err) => log::debug!("{}: {} = Err({} ({:#X}))", caller, string, err, err.errno),
    }
}

#[cfg(not(feature = "syscall_debug"))]
#[inline(always)]
pub fn debug_start(_caller: ProcessId, _args: [usize; 5]) {}
#[cfg(not(feature = "syscall_debug"))]
#[inline(always)]
pub fn debug_end(_caller: ProcessId, _args: [usize; 5], _result: &Result<usize>) {}
