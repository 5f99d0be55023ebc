use std::sync::Arc;

use super::lru::LinkedPolicy;
use super::{CacheAction, CachePolicy, CachePolicyKey};
use crate::layout::PointerSlot;
use crate::memory::{Address, Slab};

/// Insertion-order eviction: accesses do not reorder entries.
pub struct FifoCachePolicy {
    inner: LinkedPolicy,
}

impl FifoCachePolicy {
    pub fn new(slab: Arc<Slab>, cache_next: PointerSlot, cache_prev: PointerSlot) -> Self {
        FifoCachePolicy {
            inner: LinkedPolicy::new(slab, cache_next, cache_prev, false),
        }
    }

    pub fn order(&self) -> Vec<Address> {
        self.inner.order()
    }
}

impl CachePolicy for FifoCachePolicy {
    fn add_entry(&self, entry: Address, should_evict: bool) -> CacheAction {
        self.inner.add_entry(entry, should_evict)
    }

    fn update_entry(&self, key: CachePolicyKey, should_evict: bool) -> Option<CacheAction> {
        self.inner.update_entry(key, should_evict)
    }

    fn remove_entry(&self, key: CachePolicyKey, should_evict: bool) -> Option<CacheAction> {
        self.inner.remove_entry(key, should_evict)
    }

    fn evict(&self) -> Option<CacheAction> {
        self.inner.evict()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
