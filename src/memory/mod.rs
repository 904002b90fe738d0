//! # Memory management
//!
//! Physical frames, the frame allocator and the backing store that holds frame contents.
//! Frames handed out by [`PhysicalMemory`] are owned by the [`FrameRefTable`] from then on.

use alloc::{boxed::Box, vec, vec::Vec};
use core::num::NonZeroUsize;

use spin::Mutex;

use crate::paging::{PhysicalAddress, PAGE_MASK, PAGE_SIZE};
use crate::syscall::error::{Error, ENOMEM};

pub use self::refcount::FrameRefTable;

pub mod refcount;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Frame {
    // Frame 0x0 is never handed out, so the niche keeps Option<Frame> one word wide.
    physaddr: NonZeroUsize,
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[frame at {:p}]", self.base().data() as *const u8)
    }
}

impl Frame {
    /// Create a frame containing `address`
    pub fn containing(address: PhysicalAddress) -> Frame {
        Frame {
            physaddr: NonZeroUsize::new(address.data() & !PAGE_MASK)
                .expect("frame 0x0 is reserved"),
        }
    }
    pub fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.physaddr.get())
    }
    pub fn next_by(self, n: usize) -> Self {
        Self {
            physaddr: self
                .physaddr
                .get()
                .checked_add(n * PAGE_SIZE)
                .and_then(NonZeroUsize::new)
                .expect("overflow in Frame::next_by"),
        }
    }
    pub fn offset_from(self, from: Self) -> usize {
        self.physaddr
            .get()
            .checked_sub(from.physaddr.get())
            .expect("overflow in Frame::offset_from") / PAGE_SIZE
    }
}

#[derive(Debug)]
pub struct Enomem;

impl From<Enomem> for Error {
    fn from(_: Enomem) -> Self {
        Self::new(ENOMEM)
    }
}

/// Source of physical frames.
pub trait FrameAllocator {
    /// Allocate one zeroed frame
    fn allocate_frame(&self) -> Option<Frame>;

    /// Return a frame to the allocator.
    ///
    /// # Safety
    ///
    /// No page table entry may reference `frame` any longer.
    unsafe fn deallocate_frame(&self, frame: Frame);
}

#[derive(Default)]
struct FrameSlot {
    used: bool,
    // Populated on first allocation, so large machines do not cost memory up front.
    data: Option<Box<[u8]>>,
}

/// The machine's physical memory: a contiguous run of frames starting at `base`, and the
/// LIFO free list the allocator pops from.
pub struct PhysicalMemory {
    base: Frame,
    frames: Box<[Mutex<FrameSlot>]>,
    freelist: Mutex<Vec<Frame>>,
}

impl PhysicalMemory {
    pub fn new(base: PhysicalAddress, frame_count: usize) -> Self {
        let base = Frame::containing(base);
        let frames = (0..frame_count)
            .map(|_| Mutex::new(FrameSlot::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        // Reversed, so the lowest frames are handed out first.
        let freelist = (0..frame_count).rev().map(|i| base.next_by(i)).collect();

        Self {
            base,
            frames,
            freelist: Mutex::new(freelist),
        }
    }

    /// Get the number of frames available
    pub fn free_frames(&self) -> usize {
        self.freelist.lock().len()
    }

    /// Get the number of frames used
    pub fn used_frames(&self) -> usize {
        self.frames.len() - self.free_frames()
    }

    fn slot(&self, frame: Frame) -> Option<&Mutex<FrameSlot>> {
        if frame < self.base {
            return None;
        }
        self.frames.get(frame.offset_from(self.base))
    }

    /// Run `f` on the contents of an allocated frame.
    ///
    /// # Panics
    ///
    /// Panics if the frame is not allocated; a page table entry pointing at a free frame is
    /// a reference-count bug.
    pub fn with_frame<R>(&self, frame: Frame, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let slot = self
            .slot(frame)
            .unwrap_or_else(|| panic!("{frame:?} is outside physical memory"));
        let mut slot = slot.lock();
        assert!(slot.used, "accessing contents of free {frame:?}");
        let data = slot.data.get_or_insert_with(|| vec![0_u8; PAGE_SIZE].into_boxed_slice());
        f(data)
    }
}

impl FrameAllocator for PhysicalMemory {
    fn allocate_frame(&self) -> Option<Frame> {
        let Some(frame) = self.freelist.lock().pop() else {
            log::warn!("out of physical frames");
            return None;
        };
        let mut slot = self.slot(frame)?.lock();
        debug_assert!(!slot.used, "freelist frames must not be marked used!");
        slot.used = true;
        if let Some(data) = slot.data.as_mut() {
            data.fill(0);
        }
        Some(frame)
    }

    unsafe fn deallocate_frame(&self, frame: Frame) {
        let slot = self
            .slot(frame)
            .unwrap_or_else(|| panic!("attempting to free non-allocator-owned {frame:?}"));
        {
            let mut slot = slot.lock();
            assert!(slot.used, "{frame:?} freed twice");
            slot.used = false;
        }
        self.freelist.lock().push(frame);
    }
}
