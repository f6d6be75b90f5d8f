//! The allocator facade: `init`, `allocate`, `release`, `reallocate`.
//!
//! Ties the block layout, free list, coalescer and placer together into a
//! first-fit allocator over a [`RegionProvider`], extending the region on a
//! miss.

use crate::block::{self, BlockPtr};
use crate::checker;
use crate::coalesce::coalesce;
use crate::error::{AllocError, CheckError};
use crate::free_list::FreeList;
use crate::place::place;
use crate::region::RegionProvider;
use crate::{CHUNKSIZE, DWORD, MIN_BLOCK, WORD};

/// A first-fit, boundary-tag, explicit-free-list heap allocator over a
/// [`RegionProvider`] of type `R`.
///
/// `Heap<R>` owns `R` exclusively for its lifetime: no other code may call
/// methods on the same provider instance while a `Heap` wraps it. It is
/// single-threaded by design (see the crate's concurrency non-goal) and is
/// therefore deliberately not `Sync`.
pub struct Heap<R: RegionProvider> {
    region: R,
    /// Payload pointer of the permanent prologue block.
    heap_listp: BlockPtr,
    /// Address of the current epilogue header.
    epilogue_addr: usize,
    free_list: FreeList,
}

impl<R: RegionProvider> Heap<R> {
    /// Initialize a new heap over `region`.
    ///
    /// Requests `4 * W` bytes to lay down the prologue/epilogue sentinels,
    /// then seeds an initial free block of [`CHUNKSIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::OutOfMemory`] if either request is refused by
    /// the region provider.
    pub fn init(mut region: R) -> Result<Self, AllocError> {
        let base = region.extend(4 * WORD).ok_or(AllocError::OutOfMemory)?;

        // [pad W][prologue hdr (D,1)][prologue ftr (D,1)][epilogue hdr (0,1)]
        block::write_word(base, 0);
        let prologue = BlockPtr::new(base + DWORD);
        prologue.set_tags(DWORD, true);
        let epilogue_addr = base + 3 * WORD;
        block::write_word(epilogue_addr, BlockPtr::pack(0, true));

        let mut heap = Self {
            region,
            heap_listp: prologue,
            epilogue_addr,
            free_list: FreeList::new(),
        };
        heap.extend(CHUNKSIZE / WORD).ok_or(AllocError::OutOfMemory)?;
        Ok(heap)
    }

    /// Round the requested payload `size` up to an allocatable block size.
    fn adjusted_size(size: usize) -> usize {
        if size <= DWORD {
            MIN_BLOCK
        } else {
            DWORD * (size + DWORD).div_ceil(DWORD)
        }
    }

    /// Grow the region by `words` machine words (rounded up to an even
    /// count so the request stays `D`-aligned), seed a new free block over
    /// it, and coalesce that block with the heap's previous tail.
    ///
    /// Returns the (possibly merged) new block, or `None` if the region
    /// provider refuses to extend.
    fn extend(&mut self, words: usize) -> Option<BlockPtr> {
        let words = if words % 2 == 0 { words } else { words + 1 };
        let bytes = words * WORD;
        let base = self.region.extend(bytes)?;

        let bp = BlockPtr::new(base);
        bp.set_tags(bytes, false);

        let new_epilogue_addr = base + bytes - WORD;
        block::write_word(new_epilogue_addr, BlockPtr::pack(0, true));
        self.epilogue_addr = new_epilogue_addr;

        Some(coalesce(&mut self.free_list, bp))
    }

    /// Allocate `size` bytes, returning the payload address on success.
    ///
    /// `size == 0` returns `None` without touching the heap. On a miss
    /// against the free list, extends the region by
    /// `max(adjusted_size, CHUNKSIZE)` bytes before retrying placement;
    /// returns `None` if that extension fails.
    #[must_use]
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        if size == 0 {
            return None;
        }
        let asize = Self::adjusted_size(size);

        if let Some(bp) = self.free_list.find_fit(asize) {
            place(&mut self.free_list, bp, asize);
            return Some(bp.addr());
        }

        let extend_words = core::cmp::max(asize, CHUNKSIZE) / WORD;
        let bp = self.extend(extend_words)?;
        // The freshly extended (and possibly coalesced) block is guaranteed
        // large enough: it is at least `max(asize, CHUNKSIZE)` bytes.
        place(&mut self.free_list, bp, asize);
        Some(bp.addr())
    }

    /// Free a previously allocated block. `None` is a no-op.
    ///
    /// # Safety (informal)
    /// `ptr`, if `Some`, must be a payload address previously returned by
    /// `allocate`/`reallocate` on this heap and not already released.
    pub fn release(&mut self, ptr: Option<usize>) {
        let Some(addr) = ptr else { return };
        let bp = BlockPtr::new(addr);
        let size = bp.size();
        bp.set_tags(size, false);
        coalesce(&mut self.free_list, bp);
    }

    /// Resize a previously allocated block to `size` bytes.
    ///
    /// `ptr == None` behaves like `allocate(size)`. A non-null `ptr` with
    /// `size == 0` behaves like `release(ptr)` and returns `None`.
    ///
    /// If the block already has capacity `>= size`, it is returned
    /// unchanged. Otherwise, if the immediately following block is free
    /// and, combined with the current block, large enough, the allocation
    /// grows in place (no copy). Failing that, a new block is allocated,
    /// the old payload is copied over, and the old block is released.
    #[must_use]
    pub fn reallocate(&mut self, ptr: Option<usize>, size: usize) -> Option<usize> {
        let Some(addr) = ptr else {
            return self.allocate(size);
        };
        if size == 0 {
            self.release(Some(addr));
            return None;
        }

        let bp = BlockPtr::new(addr);
        let asize = Self::adjusted_size(size);
        let old_total = bp.size();

        if asize <= old_total {
            return Some(addr);
        }

        let next = bp.next_block();
        if !next.is_alloc() {
            let combined = old_total + next.size();
            if combined >= asize {
                self.free_list.remove(next);
                let remainder = combined - asize;
                if remainder >= MIN_BLOCK {
                    bp.set_tags(asize, true);
                    let rp = BlockPtr::new(bp.addr() + asize);
                    rp.set_tags(remainder, false);
                    self.free_list.add(rp);
                } else {
                    bp.set_tags(combined, true);
                }
                return Some(addr);
            }
        }

        let old_payload_cap = old_total - DWORD;
        let new_addr = self.allocate(size)?;
        let copy_len = core::cmp::min(size, old_payload_cap);
        bp.copy_payload_to(BlockPtr::new(new_addr), copy_len);
        self.release(Some(addr));
        Some(new_addr)
    }

    /// Audit every heap invariant. Diagnostic only; never mutates the heap.
    ///
    /// # Errors
    ///
    /// Returns the first [`CheckError`] encountered while walking the heap.
    pub fn check(&self) -> Result<(), CheckError> {
        checker::check(
            self.heap_listp,
            self.epilogue_addr,
            &self.free_list,
            self.region.heap_lo(),
            self.region.heap_hi(),
        )
    }

    /// The region provider backing this heap.
    #[must_use]
    pub const fn region(&self) -> &R {
        &self.region
    }
}
