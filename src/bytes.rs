//! Byte-sequence views with content equality and hashing.
//!
//! Keys and values enter the store as anything implementing [`ByteArray`]
//! and live in the slab as [`OffHeapByteArray`] blocks: a `u32` length
//! followed by the payload.
use std::borrow::Cow;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::LazyLock;

use ahash::RandomState;

use crate::error::{Error, Result};
use crate::layout::{ByteArrayAccessor, ByteArraySlot, StructBuilder, LENGTH_PREFIX_SIZE};
use crate::memory::{Address, Slab};

// Fixed seeds: a key hashes identically whether it is on or off the heap,
// and across map instances sharing a slab.
static CONTENT_HASHER: LazyLock<RandomState> = LazyLock::new(|| {
    RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
});

/// Hash of a byte sequence's content.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    CONTENT_HASHER.hash_one(bytes)
}

/// Anything that reads as a sequence of bytes.
pub trait ByteArray {
    fn length(&self) -> usize;

    fn byte_at(&self, position: usize) -> u8;

    /// All bytes in one slice, borrowed when already contiguous.
    fn as_contiguous(&self) -> Cow<'_, [u8]> {
        Cow::Owned((0..self.length()).map(|i| self.byte_at(i)).collect())
    }

    fn content_hash(&self) -> u64 {
        hash_bytes(&self.as_contiguous())
    }
}

/// Content equality across representations.
pub fn content_eq<A, B>(a: &A, b: &B) -> bool
where
    A: ByteArray + ?Sized,
    B: ByteArray + ?Sized,
{
    a.length() == b.length() && a.as_contiguous() == b.as_contiguous()
}

impl ByteArray for [u8] {
    fn length(&self) -> usize {
        self.len()
    }

    fn byte_at(&self, position: usize) -> u8 {
        self[position]
    }

    fn as_contiguous(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl<const N: usize> ByteArray for [u8; N] {
    fn length(&self) -> usize {
        N
    }

    fn byte_at(&self, position: usize) -> u8 {
        self[position]
    }

    fn as_contiguous(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl ByteArray for Vec<u8> {
    fn length(&self) -> usize {
        self.len()
    }

    fn byte_at(&self, position: usize) -> u8 {
        self[position]
    }

    fn as_contiguous(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self)
    }
}

impl ByteArray for str {
    fn length(&self) -> usize {
        self.len()
    }

    fn byte_at(&self, position: usize) -> u8 {
        self.as_bytes()[position]
    }

    fn as_contiguous(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_bytes())
    }
}

struct ByteArrayLayout {
    bytes: ByteArraySlot,
}

static LAYOUT: LazyLock<ByteArrayLayout> = LazyLock::new(|| {
    let mut b = StructBuilder::new("byte_array");
    let bytes = b.byte_array();
    let _ = b.build();
    ByteArrayLayout { bytes }
});

/// Handle to a length-prefixed block in a slab.
///
/// The handle itself carries no slab reference; bind it with
/// [`OffHeapByteArray::view`] for content comparison and hashing.
#[derive(Clone, Copy, Debug)]
pub struct OffHeapByteArray {
    address: Address,
    length: u32,
}

impl OffHeapByteArray {
    pub(crate) fn new(address: Address, length: u32) -> Self {
        OffHeapByteArray { address, length }
    }

    /// Allocate an uninitialized block of `length` payload bytes.
    pub fn allocate(slab: &Slab, length: u32) -> Result<Self> {
        let address = slab.allocate(Self::footprint_for(length))?;
        LAYOUT.bytes.create(slab, address, length);
        Ok(OffHeapByteArray::new(address, length))
    }

    /// Copy `bytes` into a freshly allocated block.
    pub fn from_bytes(slab: &Slab, bytes: &[u8]) -> Result<Self> {
        // Lengths are stored in a u32 prefix.
        let length = u32::try_from(bytes.len()).map_err(|_| Error::AllocationFailed {
            requested: bytes.len() as u64,
            largest_free: u32::MAX as u64,
        })?;
        let array = OffHeapByteArray::allocate(slab, length)?;
        array.accessor(slab).write(0, bytes);
        Ok(array)
    }

    /// Rebind an existing block by reading its length prefix.
    pub fn wrap(slab: &Slab, address: Address) -> Self {
        let length = LAYOUT.bytes.accessor(slab, address).length() as u32;
        OffHeapByteArray::new(address, length)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Slab bytes occupied, prefix included.
    pub fn footprint(&self) -> u64 {
        Self::footprint_for(self.length)
    }

    fn footprint_for(length: u32) -> u64 {
        LENGTH_PREFIX_SIZE as u64 + length as u64
    }

    pub fn accessor<'a>(&self, slab: &'a Slab) -> ByteArrayAccessor<'a> {
        LAYOUT.bytes.accessor(slab, self.address)
    }

    pub fn view(self, slab: &Slab) -> ByteArrayView<'_> {
        ByteArrayView { slab, array: self }
    }

    pub fn to_vec(&self, slab: &Slab) -> Vec<u8> {
        slab.to_vec(self.payload(), self.len())
    }

    /// Compare content with `other` without copying.
    pub fn content_eq(&self, slab: &Slab, other: &[u8]) -> bool {
        self.len() == other.len() && slab.bytes_eq(self.payload(), other)
    }

    /// Return the block to the slab. The handle must not be used afterwards.
    pub fn free(self, slab: &Slab) {
        slab.free(self.address, self.footprint());
    }

    fn payload(&self) -> Address {
        self.address.add(LENGTH_PREFIX_SIZE)
    }
}

/// An [`OffHeapByteArray`] bound to its slab.
#[derive(Clone, Copy)]
pub struct ByteArrayView<'a> {
    slab: &'a Slab,
    array: OffHeapByteArray,
}

impl ByteArrayView<'_> {
    pub fn array(&self) -> OffHeapByteArray {
        self.array
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.array.to_vec(self.slab)
    }
}

impl ByteArray for ByteArrayView<'_> {
    fn length(&self) -> usize {
        self.array.len()
    }

    fn byte_at(&self, position: usize) -> u8 {
        self.array.accessor(self.slab).get(position)
    }

    fn as_contiguous(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_vec())
    }
}

impl PartialEq for ByteArrayView<'_> {
    fn eq(&self, other: &Self) -> bool {
        content_eq(self, other)
    }
}

impl Eq for ByteArrayView<'_> {}

impl PartialEq<[u8]> for ByteArrayView<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        self.array.content_eq(self.slab, other)
    }
}

impl Hash for ByteArrayView<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

impl fmt::Debug for ByteArrayView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteArrayView")
            .field("address", &self.array.address)
            .field("content", &self.to_vec())
            .finish()
    }
}
