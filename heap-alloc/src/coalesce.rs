//! Boundary-tag coalescing.
//!
//! After a block is marked free (by `release` or by `extend` seeding a new
//! tail block), it is not yet on the free list. [`coalesce`] merges it with
//! any free address-adjacent neighbors first, then inserts the (possibly
//! grown, possibly relocated) result into the free list exactly once. This
//! keeps the "no two adjacent free blocks" invariant intact after every
//! mutation, rather than only restoring it lazily.

use crate::block::BlockPtr;
use crate::free_list::FreeList;

/// Merge `bp` (currently free, not yet listed) with any free neighbors and
/// insert the result into `list`.
///
/// Returns the block's final `BlockPtr`, which may differ from `bp` if the
/// previous block absorbed it.
pub(crate) fn coalesce(list: &mut FreeList, bp: BlockPtr) -> BlockPtr {
    let prev = bp.prev_block();
    let next = bp.next_block();
    let prev_free = !prev.is_alloc();
    let next_free = !next.is_alloc();

    match (prev_free, next_free) {
        (false, false) => {
            list.add(bp);
            bp
        }
        (false, true) => {
            list.remove(next);
            let merged_size = bp.size() + next.size();
            bp.set_tags(merged_size, false);
            list.add(bp);
            bp
        }
        (true, false) => {
            list.remove(prev);
            let merged_size = prev.size() + bp.size();
            prev.set_tags(merged_size, false);
            list.add(prev);
            prev
        }
        (true, true) => {
            list.remove(prev);
            list.remove(next);
            let merged_size = prev.size() + bp.size() + next.size();
            prev.set_tags(merged_size, false);
            list.add(prev);
            prev
        }
    }
}
