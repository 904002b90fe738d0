//! Per-process address space: a page table and the high-water mark `size`.
//!
//! Growth and shrinkage only ever happen at the top. Ordinary heap growth maps privately
//! owned frames; shared windows (see [`super::shm`]) are appended the same way and recorded
//! on a stack so they can only be removed top-first.

use alloc::vec::Vec;

use crate::memory::{FrameRefTable, PhysicalMemory};
use crate::paging::{
    round_up_pages, EntryFlags, Page, PageTable, PhysicalAddress, VirtualAddress, PAGE_SIZE,
};
use crate::syscall::error::{Error, Result, EINVAL, ENOMEM};
use crate::syscall::UserSlice;

/// A shared window installed at the top of an address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SharedWindow {
    pub start: Page,
    pub count: usize,
    /// The address space size before the window was appended
    pub size_before: usize,
}

impl SharedWindow {
    pub fn end(&self) -> VirtualAddress {
        self.start.next_by(self.count).start_address()
    }
}

pub struct AddrSpace {
    table: PageTable,
    size: usize,
    user_end: usize,
    pub(super) windows: Vec<SharedWindow>,
}

impl AddrSpace {
    pub fn new(user_end: usize) -> Self {
        Self {
            table: PageTable::new(),
            size: 0,
            user_end,
            windows: Vec::new(),
        }
    }

    /// Size of the in-use region starting at address 0
    pub fn size(&self) -> usize {
        self.size
    }
    pub(super) fn set_size(&mut self, size: usize) {
        debug_assert!(size <= self.user_end);
        self.size = size;
    }
    pub fn user_end(&self) -> usize {
        self.user_end
    }

    pub fn table(&self) -> &PageTable {
        &self.table
    }
    pub(super) fn table_mut(&mut self) -> &mut PageTable {
        &mut self.table
    }

    /// Shared windows, bottom first
    pub fn windows(&self) -> &[SharedWindow] {
        &self.windows
    }

    /// Translate a user virtual address to the physical address it maps to
    pub fn translate(&self, address: VirtualAddress) -> Option<PhysicalAddress> {
        let (frame, flags) = self.table.translate(Page::containing_address(address))?;
        flags
            .contains(EntryFlags::USER_ACCESSIBLE)
            .then(|| frame.base().add(address.page_offset()))
    }

    /// Copy `data` from the kernel to user memory at `address`
    pub fn copy_out(&self, memory: &PhysicalMemory, address: usize, data: &[u8]) -> Result<()> {
        UserSlice::wo(self, address, data.len())?.copy_from_slice(memory, data)
    }

    /// Copy user memory at `address` into `buf`
    pub fn copy_in(&self, memory: &PhysicalMemory, address: usize, buf: &mut [u8]) -> Result<()> {
        UserSlice::ro(self, address, buf.len())?.copy_to_slice(memory, buf)
    }

    /// Grow or shrink the address space by `n` bytes at the top, returning the previous size.
    ///
    /// Growing maps zeroed, privately owned frames; if anything runs out midway, every frame
    /// mapped by this call is released again. Shrinking drops one reference per unmapped page
    /// and may not cut into a shared window.
    pub fn grow(
        &mut self,
        n: isize,
        memory: &PhysicalMemory,
        refs: &FrameRefTable,
    ) -> Result<usize> {
        let old_size = self.size;

        if n >= 0 {
            let new_size = old_size
                .checked_add(n.unsigned_abs())
                .filter(|&size| size <= self.user_end)
                .ok_or(Error::new(ENOMEM))?;
            let start = page_above(old_size, ENOMEM)?;
            let end = page_above(new_size, ENOMEM)?;

            for (mapped, page) in Page::range(start, end.number() - start.number()).enumerate() {
                let result = refs.init_frame(memory).and_then(|frame| {
                    self.table
                        .map_to(page, frame, EntryFlags::user_rw(), memory)
                        .inspect_err(|_| {
                            let _ = refs.decrement_and_maybe_free(frame, memory);
                        })
                });
                if let Err(err) = result {
                    log::warn!("grow by {n} failed after {mapped} pages, rolling back");
                    self.unmap_range(start, mapped, memory, refs);
                    self.table.release_empty_leaves(memory);
                    return Err(err.into());
                }
            }
            self.size = new_size;
        } else {
            let new_size = old_size.checked_sub(n.unsigned_abs()).ok_or(Error::new(EINVAL))?;
            if let Some(top) = self.windows.last() {
                if new_size < top.end().data() {
                    return Err(Error::new(EINVAL));
                }
            }
            let start = page_above(new_size, EINVAL)?;
            let end = page_above(old_size, EINVAL)?;
            self.unmap_range(start, end.number() - start.number(), memory, refs);
            self.size = new_size;
        }

        Ok(old_size)
    }

    fn unmap_range(
        &mut self,
        start: Page,
        count: usize,
        memory: &PhysicalMemory,
        refs: &FrameRefTable,
    ) {
        for page in Page::range(start, count) {
            if let Some(frame) = self.table.unmap(page).and_then(|entry| entry.pointed_frame()) {
                let _ = refs.decrement_and_maybe_free(frame, memory);
            }
        }
    }

    /// Tear down everything still mapped and release the page table itself.
    ///
    /// Shared windows are expected to have been reclaimed already; anything left over is
    /// released the same way as private memory.
    pub fn destroy(&mut self, memory: &PhysicalMemory, refs: &FrameRefTable) {
        let pages = self.table.entries().map(|(page, _)| page).collect::<Vec<_>>();
        for page in pages {
            self.unmap_range(page, 1, memory, refs);
        }
        self.table.free_tables(memory);
        self.windows.clear();
        self.size = 0;
    }
}

/// First page wholly above a size of `size` bytes
fn page_above(size: usize, errno: i32) -> Result<Page> {
    let address = round_up_pages(size).ok_or(Error::new(errno))?;
    Ok(Page::containing_address(VirtualAddress::new(address)))
}

impl core::fmt::Debug for AddrSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AddrSpace")
            .field("size", &format_args!("{:#x}", self.size))
            .field("windows", &self.windows)
            .finish_non_exhaustive()
    }
}
