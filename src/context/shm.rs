//! Shared windows: aliasing a byte range of one address space into another.
//!
//! Mapping resolves every page of the source range to its frame, appends the same number of
//! pages at the top of the destination pointing at those frames, and adds one reference per
//! installed entry. The returned address keeps the source's offset within its first page.
//! Unmapping and exit-time reclamation drop those references again; whichever entry goes last
//! releases the frame.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashSet;

use super::memory::{AddrSpace, SharedWindow};
use crate::memory::{Frame, FrameRefTable, PhysicalMemory};
use crate::paging::{round_down_pages, round_up_pages, EntryFlags, Page, VirtualAddress, PAGE_SIZE};
use crate::syscall::error::{Error, EEXIST, EINVAL, ENOMEM, ESRCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShmError {
    /// No such process
    NotFound,
    /// Empty or overflowing range, or a source page that is not mapped
    InvalidRange,
    /// The destination already holds a window onto some of these frames
    Overlap,
    /// The range is not exactly the topmost shared window
    Alignment,
    /// A page in the range was not installed as a shared mapping
    NotShared,
    /// Destination address space or page-table storage exhausted
    ResourceExhausted,
}

impl fmt::Display for ShmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "no such process",
            Self::InvalidRange => "invalid range",
            Self::Overlap => "range already shared into destination",
            Self::Alignment => "range is not the topmost shared window",
            Self::NotShared => "range is not a shared mapping",
            Self::ResourceExhausted => "out of address space or page tables",
        })
    }
}

impl From<ShmError> for Error {
    fn from(err: ShmError) -> Self {
        Self::new(match err {
            ShmError::NotFound => ESRCH,
            ShmError::InvalidRange | ShmError::Alignment | ShmError::NotShared => EINVAL,
            ShmError::Overlap => EEXIST,
            ShmError::ResourceExhausted => ENOMEM,
        })
    }
}

/// Page-aligned bounds of a byte range, `(first page, page count)`.
fn page_span(address: VirtualAddress, size: usize) -> Result<(Page, usize), ShmError> {
    if size == 0 {
        return Err(ShmError::InvalidRange);
    }
    let end = address.data().checked_add(size).ok_or(ShmError::InvalidRange)?;
    let aligned_start = round_down_pages(address.data());
    let aligned_end = round_up_pages(end).ok_or(ShmError::InvalidRange)?;

    Ok((
        Page::containing_address(VirtualAddress::new(aligned_start)),
        (aligned_end - aligned_start) / PAGE_SIZE,
    ))
}

/// The frames backing a source byte range, resolved while the source is locked.
#[derive(Debug)]
pub struct SourceWindow {
    frames: Vec<Frame>,
    offset: usize,
}

impl SourceWindow {
    /// Look up every page of `[address, address + size)` in `src`.
    ///
    /// Fails without side effects if any page is not mapped user-accessible.
    pub fn resolve(
        src: &AddrSpace,
        address: VirtualAddress,
        size: usize,
    ) -> Result<Self, ShmError> {
        let (start, count) = page_span(address, size)?;
        if start.next_by(count).start_address().data() > src.user_end() {
            return Err(ShmError::InvalidRange);
        }

        let frames = Page::range(start, count)
            .map(|page| match src.table().translate(page) {
                Some((frame, flags)) if flags.contains(EntryFlags::USER_ACCESSIBLE) => Ok(frame),
                _ => {
                    log::debug!("source {page:?} is not mapped");
                    Err(ShmError::InvalidRange)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            frames,
            offset: address.page_offset(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Append the window to the top of `dst` and return the address aliasing the source
    /// address it was resolved from.
    ///
    /// The source must still be locked, so that its entries keep every frame referenced.
    /// Either the whole window is installed or nothing is.
    pub fn install(
        &self,
        dst: &mut AddrSpace,
        memory: &PhysicalMemory,
        refs: &FrameRefTable,
    ) -> Result<VirtualAddress, ShmError> {
        let wanted = self.frames.iter().copied().collect::<HashSet<_>>();
        let overlaps = dst.table().entries().any(|(_, entry)| {
            entry.is_shared() && entry.pointed_frame().is_some_and(|frame| wanted.contains(&frame))
        });
        if overlaps {
            return Err(ShmError::Overlap);
        }

        let size_before = dst.size();
        let start = round_up_pages(size_before).ok_or(ShmError::ResourceExhausted)?;
        let end = self
            .page_count()
            .checked_mul(PAGE_SIZE)
            .and_then(|bytes| start.checked_add(bytes))
            .filter(|&end| end <= dst.user_end())
            .ok_or(ShmError::ResourceExhausted)?;
        let start_page = Page::containing_address(VirtualAddress::new(start));

        for (i, &frame) in self.frames.iter().enumerate() {
            let page = start_page.next_by(i);
            if dst
                .table_mut()
                .map_to(page, frame, EntryFlags::user_shared(), memory)
                .is_err()
            {
                log::warn!(
                    "out of page tables after {i} of {} pages, rolling back",
                    self.page_count()
                );
                for (page, &frame) in Page::range(start_page, i).zip(&self.frames) {
                    dst.table_mut().unmap(page);
                    refs.decrement_and_maybe_free(frame, memory).unwrap_or_else(|| {
                        panic!("rollback released {frame:?} still mapped by the source")
                    });
                }
                dst.table_mut().release_empty_leaves(memory);
                return Err(ShmError::ResourceExhausted);
            }
            refs.increment(frame);
        }

        dst.set_size(end);
        dst.windows.push(SharedWindow {
            start: start_page,
            count: self.page_count(),
            size_before,
        });

        let address = VirtualAddress::new(start + self.offset);
        log::debug!("installed {} shared pages at {address:?}", self.page_count());
        Ok(address)
    }
}

/// Alias `[src_address, src_address + size)` of `src` into the top of `dst`.
///
/// For mapping a process into itself, resolve and install on the same address space instead.
pub fn map_shared_pages(
    src: &AddrSpace,
    dst: &mut AddrSpace,
    src_address: VirtualAddress,
    size: usize,
    memory: &PhysicalMemory,
    refs: &FrameRefTable,
) -> Result<VirtualAddress, ShmError> {
    SourceWindow::resolve(src, src_address, size)?.install(dst, memory, refs)
}

/// Remove the topmost shared window of `space`, which `[address, address + size)` must cover
/// exactly. The address space is left untouched on error.
pub fn unmap_shared_pages(
    space: &mut AddrSpace,
    address: VirtualAddress,
    size: usize,
    memory: &PhysicalMemory,
    refs: &FrameRefTable,
) -> Result<(), ShmError> {
    let (start, count) = page_span(address, size)?;

    let window = *space
        .windows()
        .last()
        .filter(|window| window.start == start && window.count == count)
        .ok_or(ShmError::Alignment)?;
    if window.end().data() != space.size() {
        return Err(ShmError::Alignment);
    }
    if !Page::range(start, count).all(|page| space.table().entry(page).is_shared()) {
        return Err(ShmError::NotShared);
    }

    for page in Page::range(start, count) {
        let frame = space
            .table_mut()
            .unmap(page)
            .and_then(|entry| entry.pointed_frame())
            .unwrap_or_else(|| panic!("shared {page:?} vanished while locked"));
        let _ = refs.decrement_and_maybe_free(frame, memory);
    }

    space.windows.pop();
    space.set_size(window.size_before);
    log::debug!("removed {count} shared pages at {:?}", start.start_address());
    Ok(())
}

/// Drop the reference held by every shared entry left in `space`, regardless of where it
/// sits. Private pages are left for [`AddrSpace::destroy`]. Returns the number of entries
/// reclaimed.
pub fn reclaim_shared_pages(
    space: &mut AddrSpace,
    memory: &PhysicalMemory,
    refs: &FrameRefTable,
) -> usize {
    let shared = space
        .table()
        .entries()
        .filter(|(_, entry)| entry.is_shared())
        .map(|(page, _)| page)
        .collect::<Vec<_>>();

    for &page in &shared {
        if let Some(frame) = space.table_mut().unmap(page).and_then(|entry| entry.pointed_frame()) {
            let _ = refs.decrement_and_maybe_free(frame, memory);
        }
    }
    space.windows.clear();

    if !shared.is_empty() {
        log::debug!("reclaimed {} shared pages", shared.len());
    }
    shared.len()
}
