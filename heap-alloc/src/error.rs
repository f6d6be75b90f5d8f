//! Error types surfaced by this crate.

/// The only error an allocation-path operation can produce: the region
/// provider refused to grow the heap further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// `RegionProvider::extend` returned `None`.
    #[error("region provider refused to extend the heap")]
    OutOfMemory,
}

/// A specific heap invariant that [`crate::Heap::check`] found violated.
///
/// Not recoverable — the checker reports these, it does not repair them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CheckError {
    /// A block's header and footer disagree.
    #[error("block at {addr:#x} has mismatched header/footer ({header:#x} != {footer:#x})")]
    TagMismatch {
        addr: usize,
        header: usize,
        footer: usize,
    },
    /// Two address-adjacent blocks are both free (should have been coalesced).
    #[error("adjacent free blocks at {first:#x} and {second:#x} were not coalesced")]
    UncoalescedNeighbors { first: usize, second: usize },
    /// A free block in the heap traversal does not appear in the free list.
    #[error("free block at {addr:#x} is not reachable from the free list")]
    OrphanedFreeBlock { addr: usize },
    /// A block reachable via the free list is marked allocated.
    #[error("free-list node at {addr:#x} is marked allocated")]
    AllocatedFreeListMember { addr: usize },
    /// An allocated block's header and footer disagree, indicating its
    /// payload was written past its bounds into the next block's header.
    #[error("allocated block at {addr:#x} overlaps the next block's header")]
    Overlap { addr: usize },
    /// A block's header lies outside the region, or its payload address is
    /// not `D`-aligned.
    #[error("block header at {addr:#x} is out of heap bounds or misaligned")]
    BoundsOrAlignment { addr: usize },
}
