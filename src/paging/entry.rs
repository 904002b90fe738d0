//! # Page table entry
//!
//! Sv39-style leaf entries: the frame number lives at bit 10 and up, permission bits below it,
//! and the two software bits (RSW) carry the kernel's own markers.

use bitflags::bitflags;

use crate::memory::Frame;

use super::{PhysicalAddress, PAGE_SHIFT};

/// A page table entry
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Entry(u64);

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntryFlags: u64 {
        const VALID =           1 << 0;
        const READABLE =        1 << 1;
        const WRITABLE =        1 << 2;
        const EXECUTABLE =      1 << 3;
        const USER_ACCESSIBLE = 1 << 4;
        /// Installed by the shared-mapping facility; the frame belongs to the reference table,
        /// not to this address space.
        const SHARED =          1 << 8;
    }
}

impl EntryFlags {
    /// Flags for ordinary, privately owned user memory
    pub fn user_rw() -> Self {
        Self::VALID | Self::READABLE | Self::WRITABLE | Self::USER_ACCESSIBLE
    }
    /// Flags for a page installed into another address space by the shared-mapping facility
    pub fn user_shared() -> Self {
        Self::user_rw() | Self::SHARED
    }
}

const FLAGS_MASK: u64 = (1 << 10) - 1;
const PPN_SHIFT: usize = 10;

impl Entry {
    /// Clear entry
    pub fn set_zero(&mut self) {
        self.0 = 0;
    }

    /// Is the entry unused?
    pub fn is_unused(&self) -> bool {
        self.0 == 0
    }

    /// Is the entry a valid mapping?
    pub fn is_valid(&self) -> bool {
        self.flags().contains(EntryFlags::VALID)
    }

    /// Was the entry installed by the shared-mapping facility?
    pub fn is_shared(&self) -> bool {
        self.flags().contains(EntryFlags::VALID | EntryFlags::SHARED)
    }

    /// Get the address this page references
    pub fn address(&self) -> PhysicalAddress {
        PhysicalAddress::new(((self.0 >> PPN_SHIFT) as usize) << PAGE_SHIFT)
    }

    /// Get the current entry flags
    pub fn flags(&self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.0 & FLAGS_MASK)
    }

    /// Get the associated frame, if available
    pub fn pointed_frame(&self) -> Option<Frame> {
        if self.is_valid() {
            Some(Frame::containing(self.address()))
        } else {
            None
        }
    }

    pub fn set(&mut self, frame: Frame, flags: EntryFlags) {
        let ppn = (frame.base().data() >> PAGE_SHIFT) as u64;
        self.0 = (ppn << PPN_SHIFT) | flags.bits();
    }
}

impl core::fmt::Debug for Entry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entry")
            .field("address", &self.address())
            .field("flags", &self.flags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Entry, EntryFlags};
    use crate::memory::Frame;
    use crate::paging::PhysicalAddress;

    #[test]
    fn entry_has_required_arch_alignment() {
        assert!(
            core::mem::align_of::<Entry>() >= core::mem::align_of::<u64>(),
            "alignment of Entry is less than the required alignment of u64 ({} < {})",
            core::mem::align_of::<Entry>(),
            core::mem::align_of::<u64>()
        );
    }

    #[test]
    fn shared_marker_survives_set() {
        let frame = Frame::containing(PhysicalAddress::new(0x8765_4000));
        let mut entry = Entry::default();
        assert!(entry.is_unused());

        entry.set(frame, EntryFlags::user_shared());
        assert!(entry.is_shared());
        assert_eq!(entry.pointed_frame(), Some(frame));
        assert_eq!(entry.address(), PhysicalAddress::new(0x8765_4000));

        entry.set(frame, EntryFlags::user_rw());
        assert!(!entry.is_shared());

        entry.set_zero();
        assert_eq!(entry.pointed_frame(), None);
    }
}
