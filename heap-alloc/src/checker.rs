//! Heap invariant auditor.
//!
//! [`check`] walks the heap once in address order and once through the
//! free list, confirming every invariant from the data model holds. It is
//! purely diagnostic: it never mutates the heap and never attempts repair.
//! Intended to be called between public operations in tests (and, in a
//! kernel, from a debug command), not on every allocation.

use crate::DWORD;
use crate::block::BlockPtr;
use crate::error::CheckError;
use crate::free_list::FreeList;
use log::{error, trace};

/// Audit every invariant in Section 3 of the design against the heap
/// rooted at `heap_listp` (the prologue payload) and bounded by
/// `[heap_lo, heap_hi)`, with free blocks tracked by `free_list`.
pub(crate) fn check(
    heap_listp: BlockPtr,
    epilogue_addr: usize,
    free_list: &FreeList,
    heap_lo: usize,
    heap_hi: usize,
) -> Result<(), CheckError> {
    match check_inner(heap_listp, epilogue_addr, free_list, heap_lo, heap_hi) {
        Ok(()) => {
            trace!("heap check passed");
            Ok(())
        }
        Err(e) => {
            error!("heap check failed: {e}");
            Err(e)
        }
    }
}

fn check_inner(
    heap_listp: BlockPtr,
    epilogue_addr: usize,
    free_list: &FreeList,
    heap_lo: usize,
    heap_hi: usize,
) -> Result<(), CheckError> {
    let mut current = heap_listp;
    let mut prev_free_addr: Option<usize> = None;

    loop {
        let hdr = current.hdr_addr();
        if hdr == epilogue_addr {
            break;
        }

        if hdr < heap_lo || hdr >= heap_hi || !current.addr().is_multiple_of(DWORD) {
            return Err(CheckError::BoundsOrAlignment { addr: hdr });
        }

        let is_free = !current.is_alloc();

        // Read the footer independently of the header's size field (rather
        // than re-deriving the same address from it) so a corrupted footer
        // is actually detected instead of trivially agreeing with itself.
        let header = current.header_tag();
        let footer = current.footer_tag();
        if header != footer {
            let (size, alloc) = header;
            let header_word = BlockPtr::pack(size, alloc);
            let (fsize, falloc) = footer;
            let footer_word = BlockPtr::pack(fsize, falloc);
            return Err(if is_free {
                CheckError::TagMismatch {
                    addr: current.addr(),
                    header: header_word,
                    footer: footer_word,
                }
            } else {
                CheckError::Overlap {
                    addr: current.addr(),
                }
            });
        }

        if is_free {
            if let Some(prev_addr) = prev_free_addr {
                return Err(CheckError::UncoalescedNeighbors {
                    first: prev_addr,
                    second: current.addr(),
                });
            }

            if !free_list.iter().any(|bp| bp.addr() == current.addr()) {
                return Err(CheckError::OrphanedFreeBlock {
                    addr: current.addr(),
                });
            }

            prev_free_addr = Some(current.addr());
        } else {
            prev_free_addr = None;
        }

        current = current.next_block();
    }

    for node in free_list.iter() {
        if node.is_alloc() {
            return Err(CheckError::AllocatedFreeListMember { addr: node.addr() });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block;
    use crate::{MIN_BLOCK, WORD};

    #[repr(align(16))]
    struct Buf([u8; 1024]);

    /// Lay out a prologue, the given `(size, alloc)` blocks in order, and an
    /// epilogue, mirroring `Heap::init`'s layout. Returns `(heap_listp,
    /// epilogue_addr, heap_lo, heap_hi, blocks)`.
    fn build(specs: &[(usize, bool)]) -> (BlockPtr, usize, usize, usize, Vec<BlockPtr>) {
        let buf = Box::leak(Box::new(Buf([0; 1024])));
        let base = buf.0.as_mut_ptr() as usize;

        block::write_word(base, 0);
        let prologue = BlockPtr::new(base + DWORD);
        prologue.set_tags(DWORD, true);

        let mut cursor = prologue.next_block();
        let mut blocks = Vec::new();
        for &(size, alloc) in specs {
            cursor.set_tags(size, alloc);
            blocks.push(cursor);
            cursor = cursor.next_block();
        }

        let epilogue_addr = cursor.hdr_addr();
        block::write_word(epilogue_addr, BlockPtr::pack(0, true));
        let heap_hi = epilogue_addr + WORD;

        (prologue, epilogue_addr, base, heap_hi, blocks)
    }

    #[test]
    fn empty_heap_passes() {
        let (listp, epi, lo, hi, _) = build(&[]);
        let list = FreeList::new();
        assert!(check_inner(listp, epi, &list, lo, hi).is_ok());
    }

    #[test]
    fn allocated_and_free_blocks_pass_when_free_list_agrees() {
        let (listp, epi, lo, hi, blocks) = build(&[(MIN_BLOCK, true), (MIN_BLOCK, false)]);
        let mut list = FreeList::new();
        list.add(blocks[1]);
        assert!(check_inner(listp, epi, &list, lo, hi).is_ok());
    }

    #[test]
    fn misaligned_block_address_is_detected() {
        let (listp, epi, lo, hi, _) = build(&[]);
        let misaligned = BlockPtr::new(listp.addr() + WORD);
        let list = FreeList::new();
        let result = check_inner(misaligned, epi, &list, lo, hi);
        assert!(matches!(result, Err(CheckError::BoundsOrAlignment { .. })));
    }

    #[test]
    fn header_before_heap_lo_is_detected() {
        let (listp, epi, _, hi, _) = build(&[]);
        let lo = listp.hdr_addr() + 1;
        let list = FreeList::new();
        let result = check_inner(listp, epi, &list, lo, hi);
        assert!(matches!(result, Err(CheckError::BoundsOrAlignment { .. })));
    }

    #[test]
    fn free_block_with_corrupted_footer_is_a_tag_mismatch() {
        let (listp, epi, lo, hi, blocks) = build(&[(MIN_BLOCK, false)]);
        let bp = blocks[0];
        block::write_word(bp.ftr_addr(), BlockPtr::pack(MIN_BLOCK * 2, false));

        let mut list = FreeList::new();
        list.add(bp);
        let result = check_inner(listp, epi, &list, lo, hi);
        assert!(matches!(result, Err(CheckError::TagMismatch { .. })));
    }

    #[test]
    fn allocated_block_with_corrupted_footer_is_an_overlap() {
        let (listp, epi, lo, hi, blocks) = build(&[(MIN_BLOCK, true)]);
        let bp = blocks[0];
        block::write_word(bp.ftr_addr(), BlockPtr::pack(MIN_BLOCK * 2, true));

        let list = FreeList::new();
        let result = check_inner(listp, epi, &list, lo, hi);
        assert!(matches!(result, Err(CheckError::Overlap { .. })));
    }

    #[test]
    fn adjacent_free_blocks_are_uncoalesced_neighbors() {
        let (listp, epi, lo, hi, blocks) = build(&[(MIN_BLOCK, false), (MIN_BLOCK, false)]);
        let mut list = FreeList::new();
        list.add(blocks[0]);
        list.add(blocks[1]);
        let result = check_inner(listp, epi, &list, lo, hi);
        assert!(matches!(result, Err(CheckError::UncoalescedNeighbors { .. })));
    }

    #[test]
    fn free_block_missing_from_free_list_is_orphaned() {
        let (listp, epi, lo, hi, _blocks) = build(&[(MIN_BLOCK, false)]);
        let list = FreeList::new();
        let result = check_inner(listp, epi, &list, lo, hi);
        assert!(matches!(result, Err(CheckError::OrphanedFreeBlock { .. })));
    }

    #[test]
    fn allocated_block_listed_as_free_is_detected() {
        let (listp, epi, lo, hi, blocks) = build(&[(MIN_BLOCK, true)]);
        let mut list = FreeList::new();
        list.add(blocks[0]);
        let result = check_inner(listp, epi, &list, lo, hi);
        assert!(matches!(
            result,
            Err(CheckError::AllocatedFreeListMember { .. })
        ));
    }
}
