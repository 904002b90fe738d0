use alloc::{borrow::Cow, collections::BTreeMap, sync::Arc};
use core::sync::atomic::Ordering;

use spinning_top::Spinlock;

use super::process::{AtomicProcessId, Process, ProcessId};
use crate::syscall::error::{Error, Result, EAGAIN};

/// Process list type
pub struct ProcessList {
    // Using a BTreeMap for its ordered iteration
    map: BTreeMap<ProcessId, Arc<Spinlock<Process>>>,
    next_id: AtomicProcessId,
    limit: usize,
}

impl ProcessList {
    /// Create a new process list holding at most `limit` processes.
    pub const fn new(limit: usize) -> Self {
        ProcessList {
            map: BTreeMap::new(),
            next_id: AtomicProcessId::new(ProcessId::new(1)),
            limit,
        }
    }

    /// Get the process with the given ID.
    pub fn get(&self, id: ProcessId) -> Option<&Arc<Spinlock<Process>>> {
        self.map.get(&id)
    }

    /// Create a new process with an empty address space.
    pub fn spawn(
        &mut self,
        parent: Option<ProcessId>,
        name: impl Into<Cow<'static, str>>,
        user_end: usize,
    ) -> Result<&Arc<Spinlock<Process>>> {
        if self.map.len() >= self.limit {
            return Err(Error::new(EAGAIN));
        }

        // Identifiers are never reused, so a stale ID can only ever miss.
        let pid = self.next_id.fetch_add(ProcessId::new(1), Ordering::Relaxed);
        let process = Arc::new(Spinlock::new(Process::new(pid, parent, name.into(), user_end)));
        assert!(self.map.insert(pid, process).is_none());

        Ok(self
            .map
            .get(&pid)
            .expect("Failed to insert new process. ID is out of bounds."))
    }

    pub fn remove(&mut self, id: ProcessId) -> Option<Arc<Spinlock<Process>>> {
        self.map.remove(&id)
    }
}
