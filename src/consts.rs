// Because the memory map is so important to not be aliased, it is defined here, in one place.
// The lower 256 GiB of the address space are user space; the two highest pages of it are
// reserved for the trampoline and the trap frame and can never be grown into.

/// Size of pages
pub const PAGE_SIZE: usize = 4096;
/// Mask of the offset bits within a page
pub const PAGE_MASK: usize = PAGE_SIZE - 1;
/// Shift from a byte address to a page number
pub const PAGE_SHIFT: usize = 12;

/// Number of entries per page table
pub const ENTRY_COUNT: usize = 512;

/// Highest user virtual address + 1, as seen by the page table walker
pub const MAX_VA: usize = 1 << (9 + 9 + 9 + PAGE_SHIFT - 1);
/// Offset of the trampoline page
pub const TRAMPOLINE_OFFSET: usize = MAX_VA - PAGE_SIZE;
/// Offset of the trap frame page
pub const TRAPFRAME_OFFSET: usize = TRAMPOLINE_OFFSET - PAGE_SIZE;
/// End of the region user memory may grow into
pub const USER_END_OFFSET: usize = TRAPFRAME_OFFSET;

/// Physical address of the first frame handed to the allocator
pub const PHYS_BASE: usize = 0x8000_0000;
/// Number of frames a default machine is given, 128 MiB
pub const DEFAULT_FRAME_COUNT: usize = 32_768;

/// Limit on number of processes
pub const PROCESS_MAX: usize = 64;
