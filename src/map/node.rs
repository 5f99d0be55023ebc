//! Bucket-chain node records.
//!
//! Physical layout (all fields 8 bytes):
//!   0..8    next         (bucket chain)
//!   8..16   key          (OffHeapByteArray address)
//!   16..24  value        (OffHeapByteArray address)
//!   24..32  cache_next   (recency list, tracked layout only)
//!   32..40  cache_prev
use std::sync::LazyLock;

use crate::bytes::OffHeapByteArray;
use crate::error::Result;
use crate::layout::{PointerSlot, Struct, StructBuilder};
use crate::memory::{Address, Slab};
use crate::policy::PolicyKind;

pub struct NodeLayout {
    layout: Struct,
    next: PointerSlot,
    key: PointerSlot,
    value: PointerSlot,
    recency: Option<(PointerSlot, PointerSlot)>,
}

/// Nodes of maps without recency tracking.
pub static NODE: LazyLock<NodeLayout> = LazyLock::new(NodeLayout::plain);

/// Nodes that also carry recency links.
pub static LRU_NODE: LazyLock<NodeLayout> = LazyLock::new(|| NodeLayout::tracked(&NODE));

impl NodeLayout {
    fn plain() -> Self {
        let mut b = StructBuilder::new("node");
        let next = b.pointer();
        let key = b.pointer();
        let value = b.pointer();
        NodeLayout {
            layout: b.build(),
            next,
            key,
            value,
            recency: None,
        }
    }

    fn tracked(base: &NodeLayout) -> Self {
        let mut b = StructBuilder::extending("lru_node", &base.layout);
        let cache_next = b.pointer();
        let cache_prev = b.pointer();
        NodeLayout {
            layout: b.build(),
            next: base.next.clone(),
            key: base.key.clone(),
            value: base.value.clone(),
            recency: Some((cache_next, cache_prev)),
        }
    }

    pub fn for_policy(kind: PolicyKind) -> &'static NodeLayout {
        if kind.tracks_recency() {
            &LRU_NODE
        } else {
            &NODE
        }
    }

    pub fn layout(&self) -> &Struct {
        &self.layout
    }

    /// Record size in bytes.
    pub fn size(&self) -> u64 {
        self.layout.static_size() as u64
    }

    /// The `(cache_next, cache_prev)` slots, for tracked layouts.
    pub fn recency(&self) -> Option<(PointerSlot, PointerSlot)> {
        self.recency.clone()
    }

    /// Allocate a detached node pointing at `key` and `value`.
    pub fn create(
        &self,
        slab: &Slab,
        key: OffHeapByteArray,
        value: OffHeapByteArray,
    ) -> Result<Address> {
        let node = slab.allocate(self.size())?;

        let next = self.next.accessor(slab, node);
        next.put(Address::NONE);
        let key_acc = self.key.accessor_after(&next);
        key_acc.put(key.address());
        let value_acc = self.value.accessor_after(&key_acc);
        value_acc.put(value.address());

        if let Some((cache_next, cache_prev)) = &self.recency {
            let cache_next = cache_next.accessor_after(&value_acc);
            cache_next.put(Address::NONE);
            cache_prev.accessor_after(&cache_next).put(Address::NONE);
        }
        Ok(node)
    }

    #[inline]
    pub fn next(&self, slab: &Slab, node: Address) -> Address {
        self.next.get(slab, node)
    }

    #[inline]
    pub fn set_next(&self, slab: &Slab, node: Address, next: Address) {
        self.next.set(slab, node, next)
    }

    pub fn key(&self, slab: &Slab, node: Address) -> OffHeapByteArray {
        OffHeapByteArray::wrap(slab, self.key.get(slab, node))
    }

    pub fn value(&self, slab: &Slab, node: Address) -> OffHeapByteArray {
        OffHeapByteArray::wrap(slab, self.value.get(slab, node))
    }

    pub fn set_value(&self, slab: &Slab, node: Address, value: OffHeapByteArray) {
        self.value.set(slab, node, value.address())
    }

    /// Free the node record only; its key and value are freed separately.
    pub fn free(&self, slab: &Slab, node: Address) {
        slab.free(node, self.size());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_sizes() {
        assert_eq!(NODE.size(), 24);
        assert_eq!(LRU_NODE.size(), 40);
        assert!(NODE.recency().is_none());

        let (cache_next, cache_prev) = LRU_NODE.recency().unwrap();
        assert_eq!(cache_next.def().static_offset(), Some(24));
        assert_eq!(cache_prev.def().static_offset(), Some(32));
    }

    #[test]
    fn layout_for_policy() {
        assert_eq!(NodeLayout::for_policy(PolicyKind::Lru).size(), 40);
        assert_eq!(NodeLayout::for_policy(PolicyKind::Fifo).size(), 40);
        assert_eq!(NodeLayout::for_policy(PolicyKind::None).size(), 24);
    }

    #[test]
    fn create_links_payloads() {
        let slab = Slab::best_fit(1024).unwrap();
        let key = OffHeapByteArray::from_bytes(&slab, b"k").unwrap();
        let value = OffHeapByteArray::from_bytes(&slab, b"value").unwrap();
        let node = LRU_NODE.create(&slab, key, value).unwrap();

        assert!(LRU_NODE.next(&slab, node).is_none());
        assert_eq!(LRU_NODE.key(&slab, node).to_vec(&slab), b"k");
        assert_eq!(LRU_NODE.value(&slab, node).to_vec(&slab), b"value");

        let (cache_next, cache_prev) = LRU_NODE.recency().unwrap();
        assert!(cache_next.get(&slab, node).is_none());
        assert!(cache_prev.get(&slab, node).is_none());

        let replacement = OffHeapByteArray::from_bytes(&slab, b"v2").unwrap();
        LRU_NODE.set_value(&slab, node, replacement);
        assert_eq!(LRU_NODE.value(&slab, node).len(), 2);

        LRU_NODE.free(&slab, node);
        key.free(&slab);
        value.free(&slab);
        replacement.free(&slab);
        assert_eq!(slab.used(), 0);
    }
}
