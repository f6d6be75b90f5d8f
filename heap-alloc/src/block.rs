//! Boundary-tag block layout.
//!
//! Every block in the heap is a contiguous, `D`-aligned byte span:
//!
//! ```text
//! offset 0        W                                         size−W       size
//!   +------------+------------------------------------------+------------+
//!   |  HEADER W  |        PAYLOAD (size − 2W bytes)          |  FOOTER W  |
//!   +------------+------------------------------------------+------------+
//!                ^ BlockPtr points here
//! ```
//!
//! [`BlockPtr`] wraps the payload address and concentrates every raw read/write
//! against the heap region in its methods. Everything above this module
//! (free list, coalescer, placer, facade, checker) reasons purely in terms of
//! `BlockPtr` and never dereferences a raw pointer itself.

use crate::{DWORD, WORD};
use core::ptr;

/// A pointer to a block's **payload** (the address returned to/accepted from callers).
///
/// `BlockPtr` is a thin newtype over the payload address; it carries no
/// lifetime or ownership semantics of its own; the enclosing `Heap` is
/// responsible for ensuring the address stays within a single, currently
/// valid region for the lifetime of any `BlockPtr` derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct BlockPtr(usize);

/// Low bit of a packed header/footer word: set when the block is allocated.
const ALLOC_BIT: usize = 0x1;

/// Mask recovering `size` from a packed header/footer word.
const SIZE_MASK: usize = !(DWORD - 1);

impl BlockPtr {
    /// Wrap a raw payload address.
    pub(crate) const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// The raw payload address.
    pub(crate) const fn addr(self) -> usize {
        self.0
    }

    /// Address of this block's header word (`bp - W`).
    pub(crate) const fn hdr_addr(self) -> usize {
        self.0 - WORD
    }

    /// Address of this block's footer word (`bp + size - 2W`).
    pub(crate) fn ftr_addr(self) -> usize {
        self.0 + self.size() - DWORD
    }

    /// Pack a `(size, alloc)` pair into a single boundary-tag word.
    ///
    /// `size` must already be `D`-aligned; its low bit is reused to store `alloc`.
    pub(crate) const fn pack(size: usize, alloc: bool) -> usize {
        size | (alloc as usize)
    }

    fn read_word(addr: usize) -> usize {
        read_word(addr)
    }

    fn write_word(addr: usize, value: usize) {
        write_word(addr, value);
    }

    /// Total block size in bytes, including header and footer.
    pub(crate) fn size(self) -> usize {
        Self::read_word(self.hdr_addr()) & SIZE_MASK
    }

    /// Whether the block is currently allocated.
    pub(crate) fn is_alloc(self) -> bool {
        Self::read_word(self.hdr_addr()) & ALLOC_BIT != 0
    }

    /// Decode the header word into `(size, alloc)`.
    pub(crate) fn header_tag(self) -> (usize, bool) {
        let word = Self::read_word(self.hdr_addr());
        (word & SIZE_MASK, word & ALLOC_BIT != 0)
    }

    /// Decode the footer word into `(size, alloc)`.
    ///
    /// Requires the header to already report a plausible `size` so the
    /// footer address can be computed; used by the checker to confirm
    /// header and footer agree rather than to navigate.
    pub(crate) fn footer_tag(self) -> (usize, bool) {
        let word = Self::read_word(self.ftr_addr());
        (word & SIZE_MASK, word & ALLOC_BIT != 0)
    }

    /// Overwrite both header and footer with `(size, alloc)`.
    pub(crate) fn set_tags(self, size: usize, alloc: bool) {
        let word = Self::pack(size, alloc);
        Self::write_word(self.hdr_addr(), word);
        Self::write_word(self.0 + size - DWORD, word);
    }

    /// The next block in address order (`bp + size(bp)`).
    pub(crate) fn next_block(self) -> Self {
        Self(self.0 + self.size())
    }

    /// The previous block in address order, read via this block's
    /// predecessor footer at `bp - 2W`.
    pub(crate) fn prev_block(self) -> Self {
        let prev_size = Self::read_word(self.0 - DWORD) & SIZE_MASK;
        Self(self.0 - prev_size)
    }

    /// Read the free-list `prev` link stored in payload word 0.
    ///
    /// Only meaningful while the block is free. Word value `0` means "none";
    /// `0` is never a valid block address because the prologue always
    /// occupies the region's lowest bytes.
    pub(crate) fn free_prev(self) -> Option<Self> {
        match Self::read_word(self.0) {
            0 => None,
            addr => Some(Self(addr)),
        }
    }

    /// Read the free-list `next` link stored in payload word 1.
    pub(crate) fn free_next(self) -> Option<Self> {
        match Self::read_word(self.0 + WORD) {
            0 => None,
            addr => Some(Self(addr)),
        }
    }

    /// Write the free-list `prev` link.
    pub(crate) fn set_free_prev(self, link: Option<Self>) {
        Self::write_word(self.0, link.map_or(0, Self::addr));
    }

    /// Write the free-list `next` link.
    pub(crate) fn set_free_next(self, link: Option<Self>) {
        Self::write_word(self.0 + WORD, link.map_or(0, Self::addr));
    }

    /// Copy `len` bytes from this block's payload into `dst`'s payload.
    ///
    /// Used by `reallocate` when the block must move. `len` must not exceed
    /// either block's payload capacity.
    pub(crate) fn copy_payload_to(self, dst: Self, len: usize) {
        // SAFETY: caller guarantees `len` fits both payloads and that the
        // two payloads do not overlap (a moving realloc never reuses the
        // source region for the destination).
        unsafe {
            ptr::copy_nonoverlapping(self.0 as *const u8, dst.0 as *mut u8, len);
        }
    }
}

/// Read a raw word at `addr`.
///
/// # Safety (informal)
/// `addr` must fall within the region handed to `Heap::init`/`extend`,
/// which the facade guarantees is valid for reads/writes of a full word.
pub(crate) fn read_word(addr: usize) -> usize {
    unsafe { ptr::read((addr as *const usize).cast()) }
}

/// Write a raw word at `addr`. See [`read_word`] for the validity requirement.
pub(crate) fn write_word(addr: usize, value: usize) {
    unsafe { ptr::write((addr as *mut usize).cast(), value) }
}
