//! Hash bucket: a singly linked chain of nodes behind an off-heap header.
//!
//! Header layout:
//!   0..8    head  (first node, NONE when empty)
//!   8..16   tail  (last node, NONE when empty)
//!   16..24  size  (live node count)
//!
//! None of these operations lock; the map holds the bucket's lock around
//! every call.
use std::sync::LazyLock;

use super::node::NodeLayout;
use crate::bytes::OffHeapByteArray;
use crate::error::Result;
use crate::layout::{LongSlot, PointerSlot, Struct, StructBuilder};
use crate::memory::{Address, Slab};

struct BucketLayout {
    layout: Struct,
    head: PointerSlot,
    tail: PointerSlot,
    size: LongSlot,
}

static BUCKET: LazyLock<BucketLayout> = LazyLock::new(|| {
    let mut b = StructBuilder::new("bucket");
    let head = b.pointer();
    let tail = b.pointer();
    let size = b.long();
    BucketLayout {
        layout: b.build(),
        head,
        tail,
        size,
    }
});

/// What a put did to the chain.
#[derive(Debug)]
pub enum PutOutcome {
    /// A new node was linked at the tail.
    Inserted { node: Address },
    /// An existing node now points at a new value; the old value is
    /// returned unfreed.
    Updated {
        node: Address,
        old_value: OffHeapByteArray,
    },
}

pub struct Bucket<'a> {
    slab: &'a Slab,
    nodes: &'a NodeLayout,
    address: Address,
}

impl<'a> Bucket<'a> {
    /// Header bytes of one bucket.
    pub fn header_size() -> u64 {
        BUCKET.layout.static_size() as u64
    }

    /// Allocate an empty bucket header.
    pub fn create(slab: &Slab) -> Result<Address> {
        let address = slab.allocate(Self::header_size())?;
        let head = BUCKET.head.accessor(slab, address);
        head.put(Address::NONE);
        let tail = BUCKET.tail.accessor_after(&head);
        tail.put(Address::NONE);
        BUCKET.size.accessor_after(&tail).put(0);
        Ok(address)
    }

    /// Free a header. The chain must already be empty.
    pub fn free_header(slab: &Slab, address: Address) {
        assert!(
            BUCKET.head.get(slab, address).is_none(),
            "freeing non-empty bucket {address:?}"
        );
        slab.free(address, Self::header_size());
    }

    pub fn open(slab: &'a Slab, nodes: &'a NodeLayout, address: Address) -> Self {
        Bucket {
            slab,
            nodes,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn head(&self) -> Address {
        BUCKET.head.get(self.slab, self.address)
    }

    pub fn tail(&self) -> Address {
        BUCKET.tail.get(self.slab, self.address)
    }

    pub fn len(&self) -> usize {
        BUCKET.size.get(self.slab, self.address) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head().is_none()
    }

    fn set_head(&self, node: Address) {
        BUCKET.head.set(self.slab, self.address, node)
    }

    fn set_tail(&self, node: Address) {
        BUCKET.tail.set(self.slab, self.address, node)
    }

    fn add_len(&self, delta: i64) {
        let size = BUCKET.size.accessor(self.slab, self.address);
        let len = size.get() + delta;
        assert!(len >= 0, "bucket {:?} size underflow", self.address);
        size.put(len);
    }

    /// Node whose key content equals `key`.
    pub fn find(&self, key: &[u8]) -> Option<Address> {
        let mut cursor = self.head();
        while let Some(node) = cursor.some() {
            if self.nodes.key(self.slab, node).content_eq(self.slab, key) {
                return Some(node);
            }
            cursor = self.nodes.next(self.slab, node);
        }
        None
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<OffHeapByteArray> {
        self.find(key).map(|node| self.nodes.value(self.slab, node))
    }

    /// Insert or replace. On allocation failure nothing in the chain changes
    /// and every partial allocation is released.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<PutOutcome> {
        if let Some(node) = self.find(key) {
            let new_value = OffHeapByteArray::from_bytes(self.slab, value)?;
            let old_value = self.nodes.value(self.slab, node);
            self.nodes.set_value(self.slab, node, new_value);
            return Ok(PutOutcome::Updated { node, old_value });
        }

        let key = OffHeapByteArray::from_bytes(self.slab, key)?;
        let value = match OffHeapByteArray::from_bytes(self.slab, value) {
            Ok(value) => value,
            Err(e) => {
                key.free(self.slab);
                return Err(e);
            }
        };
        let node = match self.nodes.create(self.slab, key, value) {
            Ok(node) => node,
            Err(e) => {
                key.free(self.slab);
                value.free(self.slab);
                return Err(e);
            }
        };

        let tail = self.tail();
        if tail.is_none() {
            self.set_head(node);
        } else {
            self.nodes.set_next(self.slab, tail, node);
        }
        self.set_tail(node);
        self.add_len(1);
        Ok(PutOutcome::Inserted { node })
    }

    /// Unlink the node holding `key`. The caller frees it.
    pub fn remove(&self, key: &[u8]) -> Option<Address> {
        let node = self.find(key)?;
        self.unlink(node);
        Some(node)
    }

    /// Unlink `node` by address. Returns false if it is not in this chain.
    pub fn unlink(&self, node: Address) -> bool {
        let mut prev = Address::NONE;
        let mut cursor = self.head();
        while let Some(current) = cursor.some() {
            let next = self.nodes.next(self.slab, current);
            if current == node {
                if prev.is_none() {
                    self.set_head(next);
                } else {
                    self.nodes.set_next(self.slab, prev, next);
                }
                if self.tail() == node {
                    self.set_tail(prev);
                }
                self.nodes.set_next(self.slab, node, Address::NONE);
                self.add_len(-1);
                return true;
            }
            prev = current;
            cursor = next;
        }
        false
    }

    /// Chain members from head to tail.
    pub fn nodes(&self) -> Vec<Address> {
        let mut out = Vec::with_capacity(self.len());
        let mut cursor = self.head();
        while let Some(node) = cursor.some() {
            out.push(node);
            cursor = self.nodes.next(self.slab, node);
        }
        out
    }
}
