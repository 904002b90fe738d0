//! Copying between kernel buffers and user virtual memory, one page at a time through the
//! page table of the address space the range belongs to.

use crate::context::AddrSpace;
use crate::memory::{Frame, PhysicalMemory};
use crate::paging::{EntryFlags, Page, VirtualAddress, PAGE_SIZE};
use crate::syscall::error::{Error, Result, EFAULT, EINVAL};

#[derive(Clone, Copy)]
pub struct UserSlice<'a, const READ: bool, const WRITE: bool> {
    space: &'a AddrSpace,
    base: usize,
    len: usize,
}
pub type UserSliceRo<'a> = UserSlice<'a, true, false>;
pub type UserSliceWo<'a> = UserSlice<'a, false, true>;

impl<'a, const READ: bool, const WRITE: bool> UserSlice<'a, READ, WRITE> {
    pub fn new(space: &'a AddrSpace, base: usize, len: usize) -> Result<Self> {
        if base.checked_add(len).map_or(true, |end| end > space.user_end()) {
            return Err(Error::new(EFAULT));
        }

        Ok(Self { space, base, len })
    }

    /// Walk the range page by page, calling `f` with each frame, the offset into it, and the
    /// offset into the range.
    fn for_each_chunk(
        &self,
        required: EntryFlags,
        mut f: impl FnMut(Frame, usize, core::ops::Range<usize>),
    ) -> Result<()> {
        let mut done = 0;
        while done < self.len {
            let address = VirtualAddress::new(self.base + done);
            let (frame, flags) = self
                .space
                .table()
                .translate(Page::containing_address(address))
                .ok_or(Error::new(EFAULT))?;
            if !flags.contains(required | EntryFlags::USER_ACCESSIBLE) {
                return Err(Error::new(EFAULT));
            }
            let offset = address.page_offset();
            let chunk = core::cmp::min(PAGE_SIZE - offset, self.len - done);
            f(frame, offset, done..done + chunk);
            done += chunk;
        }
        Ok(())
    }
}

impl<'a, const WRITE: bool> UserSlice<'a, true, WRITE> {
    /// Copy the whole user range into `slice`, which must be as long
    pub fn copy_to_slice(self, memory: &PhysicalMemory, slice: &mut [u8]) -> Result<()> {
        if self.len != slice.len() {
            return Err(Error::new(EINVAL));
        }
        self.for_each_chunk(EntryFlags::READABLE, |frame, offset, range| {
            let len = range.len();
            memory.with_frame(frame, |data| {
                slice[range].copy_from_slice(&data[offset..offset + len])
            });
        })
    }
}

impl<'a, const READ: bool> UserSlice<'a, READ, true> {
    /// Copy `slice` into the whole user range, which must be as long
    pub fn copy_from_slice(self, memory: &PhysicalMemory, slice: &[u8]) -> Result<()> {
        if self.len != slice.len() {
            return Err(Error::new(EINVAL));
        }
        self.for_each_chunk(EntryFlags::WRITABLE, |frame, offset, range| {
            let len = range.len();
            memory.with_frame(frame, |data| {
                data[offset..offset + len].copy_from_slice(&slice[range])
            });
        })
    }
}

impl<'a> UserSliceRo<'a> {
    pub fn ro(space: &'a AddrSpace, base: usize, len: usize) -> Result<Self> {
        Self::new(space, base, len)
    }
}
impl<'a> UserSliceWo<'a> {
    pub fn wo(space: &'a AddrSpace, base: usize, len: usize) -> Result<Self> {
        Self::new(space, base, len)
    }
}
