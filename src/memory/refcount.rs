//! Frame reference table.
//!
//! Every frame mapped into some address space has an entry here counting the present page
//! table entries that point at it, across all address spaces. A frame without an entry is
//! free. The transition to zero releases the frame to the allocator, exactly once.

use core::num::NonZeroUsize;

use hashbrown::HashMap;
use spin::Mutex;

use super::{Enomem, Frame, FrameAllocator};

// An entry can never be referenced by more page tables than there are processes, times the
// number of windows each can hold; this is only a guard against runaway increments.
const RC_MAX: usize = 1 << (usize::BITS - 3);

#[derive(Default)]
pub struct FrameRefTable {
    counts: Mutex<HashMap<Frame, NonZeroUsize>>,
}

impl FrameRefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh frame owned by exactly one page table entry.
    pub fn init_frame(&self, allocator: &impl FrameAllocator) -> Result<Frame, Enomem> {
        let frame = allocator.allocate_frame().ok_or(Enomem)?;
        let previous = self.counts.lock().insert(frame, NonZeroUsize::MIN);
        assert!(
            previous.is_none(),
            "allocator handed out {frame:?} which still had {previous:?} references"
        );
        Ok(frame)
    }

    /// Add one reference to a frame, returning the new count.
    ///
    /// A frame with no references is free, so the caller must itself hold a reference (the
    /// source page table entry) while adding another.
    pub fn increment(&self, frame: Frame) -> NonZeroUsize {
        let mut counts = self.counts.lock();
        let count = counts
            .get_mut(&frame)
            .unwrap_or_else(|| panic!("cannot add a reference to free {frame:?}"));
        assert!(count.get() < RC_MAX, "reference count overflow on {frame:?}");
        *count = count.saturating_add(1);
        *count
    }

    /// Drop one reference to a frame. When the last reference goes, the frame is handed back
    /// to `allocator` and `None` is returned.
    ///
    /// # Panics
    ///
    /// Panics if the frame has no references; the caller held an entry to a free frame.
    #[must_use = "the frame is gone when this returns None"]
    pub fn decrement_and_maybe_free(
        &self,
        frame: Frame,
        allocator: &impl FrameAllocator,
    ) -> Option<NonZeroUsize> {
        let mut counts = self.counts.lock();
        let Some(count) = counts.get_mut(&frame) else {
            panic!("refcount was already zero when releasing {frame:?}");
        };
        match NonZeroUsize::new(count.get() - 1) {
            Some(remaining) => {
                *count = remaining;
                Some(remaining)
            }
            None => {
                counts.remove(&frame);
                // Still under the table lock: nobody can observe the count at zero and the
                // frame still allocated, or re-reference it before it is on the free list.
                unsafe {
                    allocator.deallocate_frame(frame);
                }
                log::trace!("released {frame:?}");
                None
            }
        }
    }

    /// Current number of page table entries referencing `frame`, 0 if it is free
    pub fn count(&self, frame: Frame) -> usize {
        self.counts.lock().get(&frame).map_or(0, |count| count.get())
    }

    /// Number of frames with at least one reference
    pub fn referenced_frames(&self) -> usize {
        self.counts.lock().len()
    }
}
