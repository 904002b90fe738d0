//! # Paging
//!
//! Addresses, pages and the per-address-space page table.

use core::fmt;

pub use crate::consts::{ENTRY_COUNT, PAGE_MASK, PAGE_SHIFT, PAGE_SIZE};

pub mod entry;
pub mod table;

pub use self::entry::{Entry, EntryFlags};
pub use self::table::PageTable;

/// A physical address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalAddress(usize);

impl PhysicalAddress {
    #[inline(always)]
    pub const fn new(address: usize) -> Self {
        Self(address)
    }
    #[inline(always)]
    pub const fn data(self) -> usize {
        self.0
    }
    #[inline(always)]
    pub const fn add(self, offset: usize) -> Self {
        Self(self.0 + offset)
    }
}
impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[phys {:#0x}]", self.0)
    }
}

/// A virtual address, always interpreted within one address space.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualAddress(usize);

impl VirtualAddress {
    #[inline(always)]
    pub const fn new(address: usize) -> Self {
        Self(address)
    }
    #[inline(always)]
    pub const fn data(self) -> usize {
        self.0
    }
    #[inline(always)]
    pub const fn add(self, offset: usize) -> Self {
        Self(self.0 + offset)
    }
    /// Offset of this address within its page
    #[inline(always)]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }
}
impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[virt {:#0x}]", self.0)
    }
}

/// Round down to the nearest multiple of page size
pub const fn round_down_pages(number: usize) -> usize {
    number & !PAGE_MASK
}
/// Round up to the nearest multiple of page size, `None` on overflow
pub const fn round_up_pages(number: usize) -> Option<usize> {
    match number.checked_add(PAGE_MASK) {
        Some(n) => Some(round_down_pages(n)),
        None => None,
    }
}

/// A virtual page, identified by its page number.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Page {
    number: usize,
}

impl Page {
    pub fn start_address(self) -> VirtualAddress {
        VirtualAddress::new(self.number << PAGE_SHIFT)
    }

    pub fn containing_address(address: VirtualAddress) -> Page {
        Page {
            number: address.data() >> PAGE_SHIFT,
        }
    }

    pub const fn from_number(number: usize) -> Page {
        Page { number }
    }

    pub fn number(self) -> usize {
        self.number
    }

    /// Index of the leaf page table holding this page's entry
    pub fn table_index(self) -> usize {
        self.number / ENTRY_COUNT
    }

    /// Index of this page's entry within its leaf page table
    pub fn entry_index(self) -> usize {
        self.number % ENTRY_COUNT
    }

    pub fn next_by(self, n: usize) -> Page {
        Page {
            number: self.number + n,
        }
    }

    /// Iterate over `count` consecutive pages starting at `start`
    pub fn range(start: Page, count: usize) -> PageIter {
        PageIter {
            start,
            end: start.next_by(count),
        }
    }
}
impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[page at {:#0x}]", self.start_address().data())
    }
}

#[derive(Clone, Debug)]
pub struct PageIter {
    start: Page,
    end: Page,
}

impl Iterator for PageIter {
    type Item = Page;

    fn next(&mut self) -> Option<Page> {
        if self.start < self.end {
            let page = self.start;
            self.start = page.next_by(1);
            Some(page)
        } else {
            None
        }
    }
}
