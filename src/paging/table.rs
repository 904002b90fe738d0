//! # Page table
//!
//! Entries are grouped into leaf tables of [`ENTRY_COUNT`] entries, each backed by a frame
//! from the allocator. Leaf tables are created on demand and only released with the whole
//! table, so installing an entry can fail with [`Enomem`] while removing one never does.

use alloc::boxed::Box;
use alloc::collections::btree_map::{self, BTreeMap};

use crate::memory::{Enomem, Frame, FrameAllocator};

use super::{Entry, EntryFlags, Page, ENTRY_COUNT};

struct LeafTable {
    frame: Frame,
    entries: Box<[Entry; ENTRY_COUNT]>,
    used: usize,
}

#[derive(Default)]
pub struct PageTable {
    leaves: BTreeMap<usize, LeafTable>,
}

impl PageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for `page`, unused if no leaf table covers it
    pub fn entry(&self, page: Page) -> Entry {
        self.leaves
            .get(&page.table_index())
            .map_or_else(Entry::default, |leaf| leaf.entries[page.entry_index()])
    }

    /// Translate a page to its frame and flags
    pub fn translate(&self, page: Page) -> Option<(Frame, EntryFlags)> {
        let entry = self.entry(page);
        Some((entry.pointed_frame()?, entry.flags()))
    }

    /// Install a mapping for `page`, allocating the leaf table if needed.
    ///
    /// # Panics
    ///
    /// Panics if `page` is already mapped.
    pub fn map_to(
        &mut self,
        page: Page,
        frame: Frame,
        flags: EntryFlags,
        allocator: &impl FrameAllocator,
    ) -> Result<(), Enomem> {
        let leaf = match self.leaves.entry(page.table_index()) {
            btree_map::Entry::Occupied(occupied) => occupied.into_mut(),
            btree_map::Entry::Vacant(vacant) => {
                let frame = allocator.allocate_frame().ok_or(Enomem)?;
                vacant.insert(LeafTable {
                    frame,
                    entries: Box::new([Entry::default(); ENTRY_COUNT]),
                    used: 0,
                })
            }
        };
        let entry = &mut leaf.entries[page.entry_index()];
        assert!(!entry.is_valid(), "remap of {page:?}, already {entry:?}");
        entry.set(frame, flags | EntryFlags::VALID);
        leaf.used += 1;
        Ok(())
    }

    /// Clear the entry for `page`, returning what it held
    pub fn unmap(&mut self, page: Page) -> Option<Entry> {
        let leaf = self.leaves.get_mut(&page.table_index())?;
        let entry = &mut leaf.entries[page.entry_index()];
        if !entry.is_valid() {
            return None;
        }
        let old = *entry;
        entry.set_zero();
        leaf.used -= 1;
        Some(old)
    }

    /// Iterate over every valid entry, in ascending page order
    pub fn entries(&self) -> impl Iterator<Item = (Page, Entry)> + '_ {
        self.leaves.iter().flat_map(|(&table_index, leaf)| {
            leaf.entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.is_valid())
                .map(move |(i, entry)| (Page::from_number(table_index * ENTRY_COUNT + i), *entry))
        })
    }

    /// Number of leaf tables, each occupying one frame
    pub fn table_frames(&self) -> usize {
        self.leaves.len()
    }

    /// Release leaf tables left without any valid entry, returning how many were released
    pub fn release_empty_leaves(&mut self, allocator: &impl FrameAllocator) -> usize {
        let mut released = 0;
        self.leaves.retain(|_, leaf| {
            if leaf.used > 0 {
                return true;
            }
            unsafe {
                allocator.deallocate_frame(leaf.frame);
            }
            released += 1;
            false
        });
        released
    }

    /// Release the frames backing the leaf tables.
    ///
    /// # Panics
    ///
    /// Panics if any entry is still valid: its frame reference would leak.
    pub fn free_tables(&mut self, allocator: &impl FrameAllocator) {
        while let Some((_, leaf)) = self.leaves.pop_first() {
            assert_eq!(leaf.used, 0, "freeing page table with live entries in {:?}", leaf.frame);
            unsafe {
                allocator.deallocate_frame(leaf.frame);
            }
        }
    }
}
