use std::marker::PhantomData;

use super::{FixedValue, LENGTH_PREFIX_SIZE};
use crate::bytes::OffHeapByteArray;
use crate::memory::{Address, Slab};

/// A slot bound to one record in one slab.
pub trait SlotAccessor<'a> {
    fn slab(&self) -> &'a Slab;
    fn base_address(&self) -> Address;
    fn slot_offset(&self) -> usize;
    fn slot_size(&self) -> usize;
    fn slot_index(&self) -> usize;

    fn slot_address(&self) -> Address {
        self.base_address().add(self.slot_offset())
    }

    /// Offset of the first byte after this slot.
    fn end_offset(&self) -> usize {
        self.slot_offset() + self.slot_size()
    }
}

pub struct FixedAccessor<'a, T> {
    slab: &'a Slab,
    base: Address,
    offset: usize,
    index: usize,
    _value: PhantomData<fn() -> T>,
}

impl<'a, T: FixedValue> FixedAccessor<'a, T> {
    pub(super) fn new(slab: &'a Slab, base: Address, offset: usize, index: usize) -> Self {
        FixedAccessor {
            slab,
            base,
            offset,
            index,
            _value: PhantomData,
        }
    }

    #[inline]
    pub fn get(&self) -> T {
        T::read(self.slab, self.slot_address())
    }

    #[inline]
    pub fn put(&self, value: T) {
        T::write(self.slab, self.slot_address(), value)
    }
}

impl<'a, T: FixedValue> SlotAccessor<'a> for FixedAccessor<'a, T> {
    fn slab(&self) -> &'a Slab {
        self.slab
    }

    fn base_address(&self) -> Address {
        self.base
    }

    fn slot_offset(&self) -> usize {
        self.offset
    }

    fn slot_size(&self) -> usize {
        T::SIZE
    }

    fn slot_index(&self) -> usize {
        self.index
    }
}

/// Accessor for a length-prefixed byte array. The length is read (or
/// written) once at bind time.
pub struct ByteArrayAccessor<'a> {
    slab: &'a Slab,
    base: Address,
    offset: usize,
    index: usize,
    length: u32,
}

impl<'a> ByteArrayAccessor<'a> {
    pub(super) fn open(slab: &'a Slab, base: Address, offset: usize, index: usize) -> Self {
        let length = slab.read_u32(base.add(offset));
        ByteArrayAccessor {
            slab,
            base,
            offset,
            index,
            length,
        }
    }

    pub(super) fn create(
        slab: &'a Slab,
        base: Address,
        offset: usize,
        index: usize,
        length: u32,
    ) -> Self {
        slab.write_u32(base.add(offset), length);
        ByteArrayAccessor {
            slab,
            base,
            offset,
            index,
            length,
        }
    }

    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Address of the first payload byte.
    pub fn payload_address(&self) -> Address {
        self.slot_address().add(LENGTH_PREFIX_SIZE)
    }

    pub fn get(&self, position: usize) -> u8 {
        self.check(position, 1);
        self.slab.read_u8(self.payload_address().add(position))
    }

    pub fn put(&self, position: usize, value: u8) {
        self.check(position, 1);
        self.slab.write_u8(self.payload_address().add(position), value)
    }

    /// Copy `dst.len()` bytes starting at `position`.
    pub fn read(&self, position: usize, dst: &mut [u8]) {
        self.check(position, dst.len());
        self.slab
            .read_bytes(self.payload_address().add(position), dst)
    }

    pub fn write(&self, position: usize, src: &[u8]) {
        self.check(position, src.len());
        self.slab
            .write_bytes(self.payload_address().add(position), src)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.slab.to_vec(self.payload_address(), self.length())
    }

    pub fn as_byte_array(&self) -> OffHeapByteArray {
        OffHeapByteArray::new(self.slot_address(), self.length)
    }

    fn check(&self, position: usize, len: usize) {
        assert!(
            position + len <= self.length(),
            "byte array access [{position}, {}) past length {}",
            position + len,
            self.length
        );
    }
}

impl<'a> SlotAccessor<'a> for ByteArrayAccessor<'a> {
    fn slab(&self) -> &'a Slab {
        self.slab
    }

    fn base_address(&self) -> Address {
        self.base
    }

    fn slot_offset(&self) -> usize {
        self.offset
    }

    fn slot_size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.length()
    }

    fn slot_index(&self) -> usize {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::super::StructBuilder;
    use super::*;

    #[test]
    fn byte_array_positional_access() {
        let slab = Slab::best_fit(256).unwrap();
        let base = slab.allocate(64).unwrap();

        let mut b = StructBuilder::new("blob");
        let id = b.long();
        let data = b.byte_array();
        let _ = b.build();

        let id_acc = id.accessor(&slab, base);
        id_acc.put(9);
        let data_acc = data.create_after(&id_acc, 6);
        data_acc.write(0, b"abc");
        data_acc.put(3, b'd');
        data_acc.write(4, b"ef");

        assert_eq!(data_acc.get(3), b'd');
        assert_eq!(data_acc.to_vec(), b"abcdef");

        let mut buf = [0u8; 2];
        data_acc.read(1, &mut buf);
        assert_eq!(&buf, b"bc");

        let reopened = data.accessor(&slab, base);
        assert_eq!(reopened.length(), 6);
        assert_eq!(reopened.payload_address(), base.add(12));
        assert_eq!(id.get(&slab, base), 9);

        let array = reopened.as_byte_array();
        assert_eq!(array.address(), base.add(8));
        assert_eq!(array.len(), 6);
    }

    #[test]
    #[should_panic(expected = "past length")]
    fn byte_array_bounds() {
        let slab = Slab::best_fit(64).unwrap();
        let base = slab.allocate(16).unwrap();
        let mut b = StructBuilder::new("small");
        let data = b.byte_array();
        let acc = data.create(&slab, base, 2);
        acc.get(2);
    }
}
