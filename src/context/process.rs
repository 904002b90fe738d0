use alloc::borrow::Cow;

use super::memory::AddrSpace;

int_like!(ProcessId, AtomicProcessId, usize, AtomicUsize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Runnable,
    Exited(i32),
}

#[derive(Debug)]
pub struct Process {
    /// The process ID of this process
    pub pid: ProcessId,
    /// The ID of the parent process, if any
    pub ppid: Option<ProcessId>,
    pub name: Cow<'static, str>,
    pub status: Status,
    pub addr_space: AddrSpace,
}

impl Process {
    pub fn new(
        pid: ProcessId,
        ppid: Option<ProcessId>,
        name: Cow<'static, str>,
        user_end: usize,
    ) -> Self {
        Self {
            pid,
            ppid,
            name,
            status: Status::Runnable,
            addr_space: AddrSpace::new(user_end),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == Status::Runnable
    }
}
