use std::sync::Arc;

use parking_lot::Mutex;

use super::list::{Links, RecencyList};
use super::{CacheAction, CachePolicy, CachePolicyKey};
use crate::layout::PointerSlot;
use crate::memory::{Address, Slab};

/// Recency links stored in two pointer slots of each tracked record.
pub(super) struct SlabLinks<'a> {
    slab: &'a Slab,
    next: &'a PointerSlot,
    prev: &'a PointerSlot,
}

impl Links for SlabLinks<'_> {
    fn next(&self, node: Address) -> Address {
        self.next.get(self.slab, node)
    }

    fn prev(&self, node: Address) -> Address {
        self.prev.get(self.slab, node)
    }

    fn set_next(&mut self, node: Address, next: Address) {
        self.next.set(self.slab, node, next)
    }

    fn set_prev(&mut self, node: Address, prev: Address) {
        self.prev.set(self.slab, node, prev)
    }
}

/// Recency list threaded through slab records, shared by LRU and FIFO.
///
/// All list mutations are serialized by one lock.
pub(super) struct LinkedPolicy {
    slab: Arc<Slab>,
    cache_next: PointerSlot,
    cache_prev: PointerSlot,
    list: Mutex<RecencyList>,
    promote_on_update: bool,
}

impl LinkedPolicy {
    pub(super) fn new(
        slab: Arc<Slab>,
        cache_next: PointerSlot,
        cache_prev: PointerSlot,
        promote_on_update: bool,
    ) -> Self {
        LinkedPolicy {
            slab,
            cache_next,
            cache_prev,
            list: Mutex::new(RecencyList::new()),
            promote_on_update,
        }
    }

    fn links(&self) -> SlabLinks<'_> {
        SlabLinks {
            slab: &self.slab,
            next: &self.cache_next,
            prev: &self.cache_prev,
        }
    }

    /// Report the tail and, when evicting, detach it.
    fn action(
        list: &mut RecencyList,
        links: &mut SlabLinks<'_>,
        key: CachePolicyKey,
        should_evict: bool,
    ) -> CacheAction {
        let token = list.tail();
        let should_evict = should_evict && !token.is_none();
        if should_evict {
            list.remove(links, token);
        }
        CacheAction {
            policy_key: key,
            should_evict,
            token_to_evict: token,
        }
    }

    pub(super) fn add_entry(&self, entry: Address, should_evict: bool) -> CacheAction {
        let mut list = self.list.lock();
        let mut links = self.links();
        links.set_next(entry, Address::NONE);
        links.set_prev(entry, Address::NONE);
        list.push_head(&mut links, entry);
        Self::action(&mut list, &mut links, CachePolicyKey::new(entry), should_evict)
    }

    pub(super) fn update_entry(
        &self,
        key: CachePolicyKey,
        should_evict: bool,
    ) -> Option<CacheAction> {
        let mut list = self.list.lock();
        let mut links = self.links();
        if !list.contains(&links, key.address()) {
            return None;
        }
        if self.promote_on_update {
            list.move_to_head(&mut links, key.address());
        }
        Some(Self::action(&mut list, &mut links, key, should_evict))
    }

    pub(super) fn remove_entry(
        &self,
        key: CachePolicyKey,
        should_evict: bool,
    ) -> Option<CacheAction> {
        let mut list = self.list.lock();
        let mut links = self.links();
        if !list.contains(&links, key.address()) {
            return None;
        }
        list.remove(&mut links, key.address());
        Some(Self::action(&mut list, &mut links, key, should_evict))
    }

    pub(super) fn evict(&self) -> Option<CacheAction> {
        let mut list = self.list.lock();
        let mut links = self.links();
        let token = list.pop_tail(&mut links)?;
        Some(CacheAction {
            policy_key: CachePolicyKey::new(token),
            should_evict: true,
            token_to_evict: token,
        })
    }

    pub(super) fn len(&self) -> usize {
        self.list.lock().len()
    }

    /// Tracked entries from most to least recent.
    pub(super) fn order(&self) -> Vec<Address> {
        let list = self.list.lock();
        list.to_vec(&self.links())
    }
}

/// Least-recently-used eviction: every access moves the entry to the head.
pub struct LruCachePolicy {
    inner: LinkedPolicy,
}

impl LruCachePolicy {
    /// `cache_next` and `cache_prev` are the record's recency link slots.
    pub fn new(slab: Arc<Slab>, cache_next: PointerSlot, cache_prev: PointerSlot) -> Self {
        LruCachePolicy {
            inner: LinkedPolicy::new(slab, cache_next, cache_prev, true),
        }
    }

    pub fn order(&self) -> Vec<Address> {
        self.inner.order()
    }
}

impl CachePolicy for LruCachePolicy {
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
