//! # Shared-page mapping for a teaching kernel
//!
//! A process may expose a byte range of its address space to another process, which gets a
//! freshly appended virtual range backed by the same physical frames. Writes through either
//! side are visible to both. Every frame is reference counted across all address spaces, so
//! it is freed exactly once, whichever process unmaps or exits last.
//!
//! [`Kernel`] owns the machine: physical memory, the frame reference table and the process
//! list. User programs reach it through [`syscall::syscall`].

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate alloc;

use alloc::borrow::Cow;
use alloc::vec::Vec;

use spin::RwLock;

pub use crate::consts::*;

#[macro_use]
/// Shared data structures
pub mod common;

/// Constants like memory locations
pub mod consts;

/// Context management
pub mod context;

/// Logging
pub mod log;

/// Memory management
pub mod memory;

/// Paging
pub mod paging;

/// Synchronization primitives
pub mod sync;

/// Syscall handlers
pub mod syscall;

/// Tests
#[cfg(test)]
mod tests;

use crate::context::{ProcessId, ProcessList};
use crate::memory::{FrameRefTable, PhysicalMemory};
use crate::paging::PhysicalAddress;
use crate::syscall::error::Result;

/// Machine parameters.
#[derive(Clone, Copy, Debug)]
pub struct KernelConfig {
    /// Number of physical frames
    pub frame_count: usize,
    /// Ceiling every user address space may grow up to
    pub user_end: usize,
    /// Limit on concurrently live processes
    pub process_max: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            frame_count: DEFAULT_FRAME_COUNT,
            user_end: USER_END_OFFSET,
            process_max: PROCESS_MAX,
        }
    }
}

pub struct Kernel {
    config: KernelConfig,
    memory: PhysicalMemory,
    refs: FrameRefTable,
    processes: RwLock<ProcessList>,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        ::log::debug!("new kernel: {config:?}");
        Self {
            config,
            memory: PhysicalMemory::new(PhysicalAddress::new(PHYS_BASE), config.frame_count),
            refs: FrameRefTable::new(),
            processes: RwLock::new(ProcessList::new(config.process_max)),
        }
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }
    pub fn refs(&self) -> &FrameRefTable {
        &self.refs
    }
    pub fn processes(&self) -> &RwLock<ProcessList> {
        &self.processes
    }

    /// Create a kernel whose `log` output is kept in the kernel log.
    ///
    /// Only one logger can be installed per program. If another one already is, that one keeps
    /// receiving the output.
    pub fn with_logger(config: KernelConfig, level: ::log::LevelFilter) -> Self {
        if crate::log::init_logger(level).is_err() {
            ::log::warn!("another logger is installed, kernel log stays empty");
        }
        Self::new(config)
    }

    /// Copy out the kernel log, oldest byte first
    pub fn log_contents(&self) -> Vec<u8> {
        crate::log::contents()
    }

    /// Create a process with an empty address space
    pub fn spawn(
        &self,
        parent: Option<ProcessId>,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<ProcessId> {
        let mut processes = self.processes.write();
        let process = processes.spawn(parent, name, self.config.user_end)?;
        let pid = process.lock().pid;
        Ok(pid)
    }

    /// Get the number of frames available
    pub fn free_frames(&self) -> usize {
        self.memory.free_frames()
    }
}
