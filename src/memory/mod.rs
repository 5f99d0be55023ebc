//! Arena memory: free-range bookkeeping, the mmap-backed region and the
//! slab that ties them together.
//!
//! Everything above this module refers to arena memory only through
//! [`Address`] handles, which are byte offsets from the start of a slab.
pub mod freelist;
pub mod range;
pub mod region;
pub mod slab;

use std::fmt;

pub use freelist::{BestFit, ExtractorKind, FreeList, LargestFit, RangeExtractor, Span};
pub use range::Range;
pub use slab::Slab;

/// Opaque handle to an allocation inside a slab.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address {
    /// Sentinel stored in pointer fields that point nowhere.
    pub const NONE: Address = Address(u64::MAX);

    #[inline]
    pub const fn new(offset: u64) -> Self {
        Address(offset)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u64::MAX
    }

    /// `None` for the sentinel, otherwise `Some(self)`.
    #[inline]
    pub fn some(self) -> Option<Address> {
        (!self.is_none()).then_some(self)
    }

    /// Address `offset` bytes further on. Panics on the sentinel.
    #[inline]
    pub fn add(self, offset: usize) -> Address {
        assert!(!self.is_none(), "offset from the null address");
        Address(self.0 + offset as u64)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("Address(NONE)")
        } else {
            write!(f, "Address({:#x})", self.0)
        }
    }
}
