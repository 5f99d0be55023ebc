//! Declarative record layouts over slab memory.
//!
//! A layout is built once, in declaration order, by a [`StructBuilder`].
//! Each declared slot captures the sequence of steps needed to reach it from
//! the record's base address: fixed-size runs are summed at definition time,
//! byte arrays need their length prefix read from memory. Offsets of slots
//! that follow a byte array are therefore resolved against live data.
//!
//! Physical layout (byte array slot):
//!   0..4   payload length (u32)
//!   4..    payload bytes
pub mod accessor;

use std::marker::PhantomData;
use std::sync::Arc;

pub use accessor::{ByteArrayAccessor, FixedAccessor, SlotAccessor};

use crate::memory::{Address, Slab};

pub const INT_SIZE: usize = 4;
pub const LONG_SIZE: usize = 8;
pub const POINTER_SIZE: usize = 8;
/// Bytes taken by a byte array's length field.
pub const LENGTH_PREFIX_SIZE: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotType {
    Int,
    Long,
    Pointer,
    ByteArray,
}

impl SlotType {
    /// Size known without reading memory; `None` for byte arrays.
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            SlotType::Int => Some(INT_SIZE),
            SlotType::Long => Some(LONG_SIZE),
            SlotType::Pointer => Some(POINTER_SIZE),
            SlotType::ByteArray => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Fixed(usize),
    ByteArray,
}

fn walk(steps: &[Step], slab: &Slab, base: Address) -> usize {
    let mut offset = 0;
    for step in steps {
        match *step {
            Step::Fixed(size) => offset += size,
            Step::ByteArray => {
                offset += LENGTH_PREFIX_SIZE + slab.read_u32(base.add(offset)) as usize
            }
        }
    }
    offset
}

fn static_offset(steps: &[Step]) -> Option<usize> {
    steps.iter().try_fold(0, |acc, step| match step {
        Step::Fixed(size) => Some(acc + size),
        Step::ByteArray => None,
    })
}

/// Position of one declared slot within its layout.
#[derive(Clone, Debug)]
pub struct SlotDef {
    ty: SlotType,
    index: usize,
    prefix: Arc<[Step]>,
}

impl SlotDef {
    pub fn slot_type(&self) -> SlotType {
        self.ty
    }

    /// Zero-based declaration index, counting inherited slots.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset from the base when no byte array precedes this slot.
    pub fn static_offset(&self) -> Option<usize> {
        static_offset(&self.prefix)
    }

    /// Offset from `base`, reading any preceding length prefixes.
    pub fn resolve_offset(&self, slab: &Slab, base: Address) -> usize {
        walk(&self.prefix, slab, base)
    }
}

/// Value types that occupy a fixed number of bytes.
pub trait FixedValue: Copy {
    const SIZE: usize;
    const TYPE: SlotType;

    fn read(slab: &Slab, address: Address) -> Self;
    fn write(slab: &Slab, address: Address, value: Self);
}

impl FixedValue for i32 {
    const SIZE: usize = INT_SIZE;
    const TYPE: SlotType = SlotType::Int;

    fn read(slab: &Slab, address: Address) -> Self {
        slab.read_i32(address)
    }

    fn write(slab: &Slab, address: Address, value: Self) {
        slab.write_i32(address, value)
    }
}

impl FixedValue for i64 {
    const SIZE: usize = LONG_SIZE;
    const TYPE: SlotType = SlotType::Long;

    fn read(slab: &Slab, address: Address) -> Self {
        slab.read_i64(address)
    }

    fn write(slab: &Slab, address: Address, value: Self) {
        slab.write_i64(address, value)
    }
}

impl FixedValue for Address {
    const SIZE: usize = POINTER_SIZE;
    const TYPE: SlotType = SlotType::Pointer;

    fn read(slab: &Slab, address: Address) -> Self {
        slab.read_address(address)
    }

    fn write(slab: &Slab, address: Address, value: Self) {
        slab.write_address(address, value)
    }
}

/// A fixed-width slot holding a `T`.
#[derive(Clone, Debug)]
pub struct FixedSlot<T> {
    def: SlotDef,
    _value: PhantomData<fn() -> T>,
}

pub type IntSlot = FixedSlot<i32>;
pub type LongSlot = FixedSlot<i64>;
pub type PointerSlot = FixedSlot<Address>;

impl<T: FixedValue> FixedSlot<T> {
    pub fn def(&self) -> &SlotDef {
        &self.def
    }

    /// Bind to a record at `base`.
    pub fn accessor<'a>(&self, slab: &'a Slab, base: Address) -> FixedAccessor<'a, T> {
        let offset = self.def.resolve_offset(slab, base);
        FixedAccessor::new(slab, base, offset, self.def.index)
    }

    /// Bind directly after the accessor of the preceding slot.
    pub fn accessor_after<'a>(&self, previous: &impl SlotAccessor<'a>) -> FixedAccessor<'a, T> {
        assert_eq!(
            previous.slot_index() + 1,
            self.def.index,
            "accessor chained from a slot that does not precede it"
        );
        FixedAccessor::new(
            previous.slab(),
            previous.base_address(),
            previous.end_offset(),
            self.def.index,
        )
    }

    /// Read without keeping an accessor around.
    #[inline]
    pub fn get(&self, slab: &Slab, base: Address) -> T {
        self.accessor(slab, base).get()
    }

    #[inline]
    pub fn set(&self, slab: &Slab, base: Address, value: T) {
        self.accessor(slab, base).put(value)
    }
}

/// A length-prefixed variable-size slot.
#[derive(Clone, Debug)]
pub struct ByteArraySlot {
    def: SlotDef,
}

impl ByteArraySlot {
    pub fn def(&self) -> &SlotDef {
        &self.def
    }

    /// Bind to an existing array; reads its length prefix.
    pub fn accessor<'a>(&self, slab: &'a Slab, base: Address) -> ByteArrayAccessor<'a> {
        let offset = self.def.resolve_offset(slab, base);
        ByteArrayAccessor::open(slab, base, offset, self.def.index)
    }

    pub fn accessor_after<'a>(&self, previous: &impl SlotAccessor<'a>) -> ByteArrayAccessor<'a> {
        assert_eq!(
            previous.slot_index() + 1,
            self.def.index,
            "accessor chained from a slot that does not precede it"
        );
        ByteArrayAccessor::open(
            previous.slab(),
            previous.base_address(),
            previous.end_offset(),
            self.def.index,
        )
    }

    /// Write a fresh length prefix at the slot and bind to it.
    pub fn create<'a>(&self, slab: &'a Slab, base: Address, length: u32) -> ByteArrayAccessor<'a> {
        let offset = self.def.resolve_offset(slab, base);
        ByteArrayAccessor::create(slab, base, offset, self.def.index, length)
    }

    pub fn create_after<'a>(
        &self,
        previous: &impl SlotAccessor<'a>,
        length: u32,
    ) -> ByteArrayAccessor<'a> {
        assert_eq!(
            previous.slot_index() + 1,
            self.def.index,
            "accessor chained from a slot that does not precede it"
        );
        ByteArrayAccessor::create(
            previous.slab(),
            previous.base_address(),
            previous.end_offset(),
            self.def.index,
            length,
        )
    }
}

/// A finished layout.
#[derive(Clone, Debug)]
pub struct Struct {
    name: &'static str,
    steps: Arc<[Step]>,
    slots: Vec<SlotType>,
}

impl Struct {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn slot_types(&self) -> &[SlotType] {
        &self.slots
    }

    /// Bytes known without reading memory: fixed slots plus length prefixes.
    pub fn static_size(&self) -> usize {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Fixed(size) => *size,
                Step::ByteArray => LENGTH_PREFIX_SIZE,
            })
            .sum()
    }

    /// Total size for layouts without byte arrays.
    pub fn fixed_size(&self) -> Option<usize> {
        static_offset(&self.steps)
    }

    /// Total size of the record at `base`.
    pub fn size_at(&self, slab: &Slab, base: Address) -> usize {
        walk(&self.steps, slab, base)
    }
}

/// Declares slots in physical order.
pub struct StructBuilder {
    name: &'static str,
    steps: Vec<Step>,
    slots: Vec<SlotType>,
}

impl StructBuilder {
    pub fn new(name: &'static str) -> Self {
        StructBuilder {
            name,
            steps: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Start from `parent`'s slots; new slots are laid out after them.
    pub fn extending(name: &'static str, parent: &Struct) -> Self {
        StructBuilder {
            name,
            steps: parent.steps.to_vec(),
            slots: parent.slots.clone(),
        }
    }

    pub fn int(&mut self) -> IntSlot {
        self.fixed()
    }

    pub fn long(&mut self) -> LongSlot {
        self.fixed()
    }

    pub fn pointer(&mut self) -> PointerSlot {
        self.fixed()
    }

    pub fn byte_array(&mut self) -> ByteArraySlot {
        let def = self.declare(SlotType::ByteArray);
        self.steps.push(Step::ByteArray);
        ByteArraySlot { def }
    }

    pub fn build(self) -> Struct {
        Struct {
            name: self.name,
            steps: self.steps.into(),
            slots: self.slots,
        }
    }

    fn fixed<T: FixedValue>(&mut self) -> FixedSlot<T> {
        let def = self.declare(T::TYPE);
        match self.steps.last_mut() {
            Some(Step::Fixed(run)) => *run += T::SIZE,
            _ => self.steps.push(Step::Fixed(T::SIZE)),
        }
        FixedSlot {
            def,
            _value: PhantomData,
        }
    }

    fn declare(&mut self, ty: SlotType) -> SlotDef {
        let def = SlotDef {
            ty,
            index: self.slots.len(),
            prefix: self.steps.as_slice().into(),
        };
        self.slots.push(ty);
        def
    }
}
