//! Off-heap hash map with recency-bounded eviction.
//!
//! Keys hash to a fixed array of bucket slots. A slot's bucket header is
//! created on first insert and published once with a compare-and-swap; each
//! slot also carries the lock that serializes its chain. Entries are
//! registered with the map's recency policy, and whatever the policy hands
//! back as an eviction token is removed only after the originating bucket
//! lock has been released.
pub mod bucket;
pub mod eviction;
pub mod node;
pub mod wrapper;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::bytes::{hash_bytes, ByteArray};
use crate::config::MapConfig;
use crate::error::Result;
use crate::memory::{Address, Slab};
use crate::policy::{
    CacheAction, CachePolicyKey, FifoCachePolicy, LruCachePolicy, NoopCachePolicy, Policy,
    PolicyKind,
};

pub use bucket::{Bucket, PutOutcome};
pub use eviction::{
    AlwaysKeepEvictionFunction, EvictionCallback, EvictionFunction, MapState,
    MaxMapSizeEvictionFunction, NoopEvictionCallback,
};
pub use node::{NodeLayout, LRU_NODE, NODE};
pub use wrapper::{KeyWrapper, NodeWrapper, ValueWrapper};

/// Point-in-time counters of one map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapStats {
    pub entries: u64,
    pub size_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub slab_used: u64,
    pub slab_free: u64,
    pub buckets_in_use: u64,
}

struct BucketSlot {
    address: AtomicU64,
    lock: Mutex<()>,
}

impl BucketSlot {
    fn new() -> Self {
        BucketSlot {
            address: AtomicU64::new(Address::NONE.get()),
            lock: Mutex::new(()),
        }
    }

    #[inline]
    fn load(&self) -> Address {
        Address::new(self.address.load(Ordering::Acquire))
    }
}

pub struct OffHeapMap {
    slab: Arc<Slab>,
    slots: Box<[BucketSlot]>,
    nodes: &'static NodeLayout,
    keys: KeyWrapper,
    values: ValueWrapper,
    policy: Policy,
    eviction: Box<dyn EvictionFunction>,
    callback: Arc<dyn EvictionCallback>,
    size_bytes: AtomicU64,
    entries: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

pub struct OffHeapMapBuilder {
    config: MapConfig,
    slab: Option<Arc<Slab>>,
    eviction: Option<Box<dyn EvictionFunction>>,
    callback: Option<Arc<dyn EvictionCallback>>,
}

impl OffHeapMapBuilder {
    pub fn new(config: MapConfig) -> Self {
        OffHeapMapBuilder {
            config,
            slab: None,
            eviction: None,
            callback: None,
        }
    }

    /// Allocate from an existing slab instead of creating one.
    /// `slab_capacity` and `extractor` are then ignored.
    pub fn slab(mut self, slab: Arc<Slab>) -> Self {
        self.slab = Some(slab);
        self
    }

    /// Replace the function implied by `max_size_bytes`.
    pub fn eviction_function(mut self, eviction: Box<dyn EvictionFunction>) -> Self {
        self.eviction = Some(eviction);
        self
    }

    pub fn eviction_callback(mut self, callback: Arc<dyn EvictionCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn build(self) -> Result<OffHeapMap> {
        self.config.validate()?;
        let slab = match self.slab {
            Some(slab) => slab,
            None => Arc::new(Slab::with_extractor(
                self.config.slab_capacity,
                self.config.extractor,
            )?),
        };

        let kind = self.config.policy;
        let nodes = NodeLayout::for_policy(kind);
        let policy = match (kind, nodes.recency()) {
            (PolicyKind::Lru, Some((next, prev))) => {
                Policy::Lru(LruCachePolicy::new(Arc::clone(&slab), next, prev))
            }
            (PolicyKind::Fifo, Some((next, prev))) => {
                Policy::Fifo(FifoCachePolicy::new(Arc::clone(&slab), next, prev))
            }
            _ => Policy::Noop(NoopCachePolicy),
        };
        let eviction = self
            .eviction
            .unwrap_or_else(|| self.config.eviction_function());
        let callback = self
            .callback
            .unwrap_or_else(|| Arc::new(NoopEvictionCallback));

        debug!(
            buckets = self.config.buckets,
            policy = ?kind,
            max_size_bytes = ?self.config.max_size_bytes,
            node_size = nodes.size(),
            "built off-heap map"
        );

        Ok(OffHeapMap {
            slab,
            slots: (0..self.config.buckets).map(|_| BucketSlot::new()).collect(),
            nodes,
            keys: KeyWrapper::new(nodes),
            values: ValueWrapper::new(nodes),
            policy,
            eviction,
            callback,
            size_bytes: AtomicU64::new(0),
            entries: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }
}

impl OffHeapMap {
    pub fn new(config: MapConfig) -> Result<Self> {
        OffHeapMapBuilder::new(config).build()
    }

    pub fn builder(config: MapConfig) -> OffHeapMapBuilder {
        OffHeapMapBuilder::new(config)
    }

    pub fn slab(&self) -> &Arc<Slab> {
        &self.slab
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    #[inline]
    fn slot(&self, hash: u64) -> &BucketSlot {
        &self.slots[(hash % self.slots.len() as u64) as usize]
    }

    /// The slot's bucket, creating and publishing it if absent.
    fn bucket_or_create(&self, slot: &BucketSlot) -> Result<Address> {
        let current = slot.load();
        if !current.is_none() {
            return Ok(current);
        }

        let created = Bucket::create(&self.slab)?;
        match slot.address.compare_exchange(
            Address::NONE.get(),
            created.get(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(created),
            Err(winner) => {
                Bucket::free_header(&self.slab, created);
                debug!(lost = created.get(), winner, "bucket publication race lost");
                Ok(Address::new(winner))
            }
        }
    }

    fn state(&self) -> MapState {
        MapState {
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
        }
    }

    /// Free an unlinked node with its payloads and drop it from the totals.
    /// Called with the node's bucket lock held.
    fn release(&self, node: Address) {
        let key = self.nodes.key(&self.slab, node);
        let value = self.nodes.value(&self.slab, node);
        let bytes = (key.len() + value.len()) as u64;
        key.free(&self.slab);
        value.free(&self.slab);
        self.nodes.free(&self.slab, node);
        self.size_bytes.fetch_sub(bytes, Ordering::Relaxed);
        self.entries.fetch_sub(1, Ordering::Relaxed);
    }

    /// Apply a policy action. Must not be called with a bucket lock held.
    fn enforce(&self, action: Option<CacheAction>) {
        let Some(action) = action else {
            return;
        };
        if let Some(token) = action.eviction() {
            self.evict_entry(token);
        }
        while self.eviction.should_continue_evicting(&self.state()) {
            match self.policy.evict() {
                Some(next) => self.evict_entry(next.token_to_evict),
                None => break,
            }
        }
    }

    /// Remove a node the policy has already detached.
    fn evict_entry(&self, node: Address) {
        // The key never changes and only this thread may free the node.
        let key = self.keys.wrap(&self.slab, node).to_vec(&self.slab);
        let slot = self.slot(hash_bytes(&key));

        let value = {
            let _guard = slot.lock.lock();
            let bucket = Bucket::open(&self.slab, self.nodes, slot.load());
            let unlinked = bucket.unlink(node);
            assert!(unlinked, "evicted {node:?} missing from its bucket");
            let value = self.values.wrap(&self.slab, node).to_vec(&self.slab);
            self.release(node);
            value
        };

        self.evictions.fetch_add(1, Ordering::Relaxed);
        trace!(
            node = node.get(),
            key_len = key.len(),
            value_len = value.len(),
            "evicted entry"
        );
        self.callback.key_evicted(&key);
        self.callback.value_evicted(&value);
    }

    /// Copy of the value stored under `key`. Counts as an access for the
    /// recency policy.
    pub fn get<K>(&self, key: &K) -> Option<Vec<u8>>
    where
        K: ByteArray + ?Sized,
    {
        let key = key.as_contiguous();
        let slot = self.slot(hash_bytes(&key));
        let address = slot.load();

        let (value, action) = if address.is_none() {
            (None, None)
        } else {
            let _guard = slot.lock.lock();
            let bucket = Bucket::open(&self.slab, self.nodes, address);
            match bucket.find(&key) {
                Some(node) => {
                    let evict = self.eviction.should_evict(&self.state());
                    // Untracked means an eviction already claimed the node.
                    match self.policy.update_entry(CachePolicyKey::new(node), evict) {
                        Some(action) => (
                            Some(self.values.wrap(&self.slab, node).to_vec(&self.slab)),
                            Some(action),
                        ),
                        None => (None, None),
                    }
                }
                None => (None, None),
            }
        };

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.enforce(action);
        value
    }

    /// Insert or replace. On allocation failure the map is left unchanged.
    pub fn put<K, V>(&self, key: &K, value: &V) -> Result<()>
    where
        K: ByteArray + ?Sized,
        V: ByteArray + ?Sized,
    {
        let key = key.as_contiguous();
        let value = value.as_contiguous();
        let slot = self.slot(hash_bytes(&key));
        let address = self.bucket_or_create(slot)?;

        let action = {
            let _guard = slot.lock.lock();
            let bucket = Bucket::open(&self.slab, self.nodes, address);
            match bucket.put(&key, &value)? {
                PutOutcome::Inserted { node } => {
                    let key_len = key.len() as u64;
                    let value_len = value.len() as u64;
                    let evict =
                        self.eviction
                            .should_evict_on_new_entry(key_len, value_len, &self.state());
                    self.size_bytes
                        .fetch_add(key_len + value_len, Ordering::Relaxed);
                    self.entries.fetch_add(1, Ordering::Relaxed);
                    Some(self.policy.add_entry(node, evict))
                }
                PutOutcome::Updated { node, old_value } => {
                    let old_len = old_value.len() as u64;
                    let new_len = value.len() as u64;
                    let evict = self
                        .eviction
                        .should_evict_on_update(old_len, new_len, &self.state());
                    old_value.free(&self.slab);
                    self.size_bytes.fetch_add(new_len, Ordering::Relaxed);
                    self.size_bytes.fetch_sub(old_len, Ordering::Relaxed);
                    self.policy.update_entry(CachePolicyKey::new(node), evict)
                }
            }
        };

        self.enforce(action);
        Ok(())
    }

    /// Remove `key`. Returns false if it was absent or is being evicted.
    pub fn remove<K>(&self, key: &K) -> bool
    where
        K: ByteArray + ?Sized,
    {
        let key = key.as_contiguous();
        let slot = self.slot(hash_bytes(&key));
        let address = slot.load();
        if address.is_none() {
            return false;
        }

        let action = {
            let _guard = slot.lock.lock();
            let bucket = Bucket::open(&self.slab, self.nodes, address);
            let Some(node) = bucket.find(&key) else {
                return false;
            };
            let evict = self.eviction.should_evict(&self.state());
            let Some(action) = self.policy.remove_entry(CachePolicyKey::new(node), evict) else {
                return false;
            };
            bucket.unlink(node);
            self.release(node);
            action
        };

        self.enforce(Some(action));
        true
    }

    pub fn contains_key<K>(&self, key: &K) -> bool
    where
        K: ByteArray + ?Sized,
    {
        let key = key.as_contiguous();
        let slot = self.slot(hash_bytes(&key));
        let address = slot.load();
        if address.is_none() {
            return false;
        }
        let _guard = slot.lock.lock();
        Bucket::open(&self.slab, self.nodes, address)
            .find(&key)
            .is_some()
    }

    /// Aggregate key and value bytes of live entries.
    pub fn size(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and free every entry without firing eviction callbacks.
    /// Bucket headers stay allocated.
    pub fn clear(&self) {
        let mut removed = 0u64;
        for slot in self.slots.iter() {
            let address = slot.load();
            if address.is_none() {
                continue;
            }
            let _guard = slot.lock.lock();
            let bucket = Bucket::open(&self.slab, self.nodes, address);
            for node in bucket.nodes() {
                if self
                    .policy
                    .remove_entry(CachePolicyKey::new(node), false)
                    .is_some()
                {
                    bucket.unlink(node);
                    self.release(node);
                    removed += 1;
                }
            }
        }
        debug!(removed, "cleared off-heap map");
    }

    pub fn stats(&self) -> MapStats {
        MapStats {
            entries: self.entries.load(Ordering::Relaxed),
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            slab_used: self.slab.used(),
            slab_free: self.slab.free_bytes(),
            buckets_in_use: self.slots.iter().filter(|s| !s.load().is_none()).count() as u64,
        }
    }
}

impl Drop for OffHeapMap {
    fn drop(&mut self) {
        self.clear();
        for slot in self.slots.iter_mut() {
            let address = Address::new(*slot.address.get_mut());
            if !address.is_none() {
                Bucket::free_header(&self.slab, address);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct Collect {
        keys: Mutex<Vec<Vec<u8>>>,
        values: Mutex<Vec<Vec<u8>>>,
    }

    impl EvictionCallback for Collect {
        fn key_evicted(&self, key: &[u8]) {
            self.keys.lock().push(key.to_vec());
        }

        fn value_evicted(&self, value: &[u8]) {
            self.values.lock().push(value.to_vec());
        }
    }

    fn config() -> MapConfig {
        MapConfig::default()
            .with_buckets(16)
            .with_slab_capacity(1 << 20)
    }

    fn bounded(max: u64) -> (OffHeapMap, Arc<Collect>) {
        let callback = Arc::new(Collect::default());
        let map = OffHeapMap::builder(config().with_max_size_bytes(max))
            .eviction_callback(callback.clone())
            .build()
            .unwrap();
        (map, callback)
    }

    /// Deterministic pseudo-random sequence.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            self.0 >> 33
        }
    }

    #[test]
    fn test_put_get_round_trip() {
        let map = OffHeapMap::new(config()).unwrap();
        assert!(map.is_empty());
        assert_eq!(map.get(b"missing"), None);

        map.put(b"alpha", b"one").unwrap();
        map.put("beta", "two").unwrap();
        assert_eq!(map.get(b"alpha").as_deref(), Some(&b"one"[..]));
        assert_eq!(map.get("beta").as_deref(), Some(&b"two"[..]));
        assert!(map.contains_key(&b"alpha".to_vec()));
        assert!(!map.contains_key(b"gamma"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.size(), 5 + 3 + 4 + 3);

        let stats = map.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_update_adjusts_size_by_delta() {
        let map = OffHeapMap::new(config()).unwrap();
        map.put(b"k", b"short").unwrap();
        assert_eq!(map.size(), 6);

        map.put(b"k", b"much longer value").unwrap();
        assert_eq!(map.size(), 1 + 17);
        assert_eq!(map.len(), 1);

        map.put(b"k", b"").unwrap();
        assert_eq!(map.size(), 1);
        assert_eq!(map.get(b"k"), Some(Vec::new()));
    }

    #[test]
    fn test_remove() {
        let map = OffHeapMap::new(config()).unwrap();
        assert!(!map.remove(b"absent"));

        map.put(b"a", b"1").unwrap();
        map.put(b"b", b"2").unwrap();
        assert!(map.remove(b"a"));
        assert!(!map.remove(b"a"));
        assert_eq!(map.get(b"a"), None);
        assert_eq!(map.get(b"b").as_deref(), Some(&b"2"[..]));
        assert_eq!(map.len(), 1);
        assert_eq!(map.size(), 2);
    }

    #[test]
    fn test_lru_evicts_least_recent() {
        let (map, evicted) = bounded(3);
        for key in [b"a", b"b", b"c", b"d"] {
            map.put(key, b"").unwrap();
        }
        assert_eq!(*evicted.keys.lock(), vec![b"a".to_vec()]);
        assert_eq!(map.get(b"a"), None);
        assert_eq!(map.size(), 3);
        assert_eq!(map.stats().evictions, 1);
    }

    #[test]
    fn test_lru_get_protects_entry() {
        let (map, evicted) = bounded(3);
        for key in [b"a", b"b", b"c"] {
            map.put(key, b"").unwrap();
        }
        assert!(map.get(b"a").is_some());
        map.put(b"d", b"").unwrap();

        assert_eq!(*evicted.keys.lock(), vec![b"b".to_vec()]);
        assert!(map.contains_key(b"a"));
        assert!(!map.contains_key(b"b"));
    }

    #[test]
    fn test_fifo_ignores_access() {
        let callback = Arc::new(Collect::default());
        let map = OffHeapMap::builder(
            config()
                .with_policy(PolicyKind::Fifo)
                .with_max_size_bytes(3),
        )
        .eviction_callback(callback.clone())
        .build()
        .unwrap();
        assert_eq!(map.policy_kind(), PolicyKind::Fifo);

        for key in [b"a", b"b", b"c"] {
            map.put(key, b"").unwrap();
        }
        assert!(map.get(b"a").is_some());
        map.put(b"d", b"").unwrap();
        assert_eq!(*callback.keys.lock(), vec![b"a".to_vec()]);
    }

    #[test]
    fn test_callback_receives_key_and_value() {
        let (map, evicted) = bounded(10);
        map.put(b"old", b"value").unwrap();
        map.put(b"new", b"value").unwrap();

        assert_eq!(*evicted.keys.lock(), vec![b"old".to_vec()]);
        assert_eq!(*evicted.values.lock(), vec![b"value".to_vec()]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.size(), 8);
    }

    #[test]
    fn test_keeps_evicting_while_over_bound() {
        let (map, evicted) = bounded(6);
        for key in [b"a", b"b", b"c"] {
            map.put(key, b"x").unwrap();
        }
        // Needs all three slots' worth of room.
        map.put(b"big", b"xxx").unwrap();

        assert_eq!(evicted.keys.lock().len(), 3);
        assert_eq!(map.len(), 1);
        assert_eq!(map.size(), 6);
        assert_eq!(map.get(b"big").as_deref(), Some(&b"xxx"[..]));
    }

    #[test]
    fn test_update_over_bound_evicts_others() {
        let (map, evicted) = bounded(8);
        map.put(b"a", b"1").unwrap();
        map.put(b"b", b"1").unwrap();
        map.put(b"a", b"123456").unwrap();

        assert_eq!(*evicted.keys.lock(), vec![b"b".to_vec()]);
        assert_eq!(map.size(), 7);
    }

    #[test]
    fn test_size_matches_model() {
        let map = OffHeapMap::new(config().with_policy(PolicyKind::None)).unwrap();
        let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
        let mut rng = Lcg(7);

        for _ in 0..2000 {
            let key = format!("key-{}", rng.next() % 64).into_bytes();
            if rng.next() % 3 == 0 {
                assert_eq!(map.remove(&key), model.remove(&key).is_some());
            } else {
                let value = vec![b'v'; (rng.next() % 40) as usize];
                map.put(&key, &value).unwrap();
                model.insert(key, value);
            }
            let expected: u64 = model.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum();
            assert_eq!(map.size(), expected);
            assert_eq!(map.len(), model.len());
        }
        for (key, value) in &model {
            assert_eq!(map.get(key).as_ref(), Some(value));
        }
    }

    #[test]
    fn test_bounded_size_matches_live_entries() {
        let (map, evicted) = bounded(200);
        let mut rng = Lcg(99);
        for _ in 0..1000 {
            let key = format!("k{}", rng.next() % 50).into_bytes();
            match rng.next() % 4 {
                0 => {
                    map.remove(&key);
                }
                1 => {
                    map.get(&key);
                }
                _ => {
                    let value = vec![0u8; (rng.next() % 30) as usize];
                    map.put(&key, &value).unwrap();
                }
            }
            assert!(map.size() <= 200);
        }

        let live: u64 = (0..50)
            .filter_map(|i| {
                let key = format!("k{i}").into_bytes();
                map.get(&key).map(|v| (key.len() + v.len()) as u64)
            })
            .sum();
        assert_eq!(map.size(), live);
        assert!(!evicted.keys.lock().is_empty());
    }

    #[test]
    fn test_single_bucket_chain() {
        let map = OffHeapMap::new(config().with_buckets(1)).unwrap();
        for i in 0..50u32 {
            map.put(&i.to_le_bytes(), &(i * 10).to_le_bytes()).unwrap();
        }
        for i in (0..50u32).step_by(2) {
            assert!(map.remove(&i.to_le_bytes()));
        }
        for i in 0..50u32 {
            let value = map.get(&i.to_le_bytes());
            if i % 2 == 0 {
                assert_eq!(value, None);
            } else {
                assert_eq!(value, Some((i * 10).to_le_bytes().to_vec()));
            }
        }
        assert_eq!(map.len(), 25);
        assert_eq!(map.stats().buckets_in_use, 1);
    }

    #[test]
    fn test_allocation_failure_leaves_map_unchanged() {
        let map = OffHeapMap::new(
            MapConfig::default()
                .with_buckets(1)
                .with_slab_capacity(512)
                .with_policy(PolicyKind::None),
        )
        .unwrap();

        let mut stored = 0u32;
        let failure = loop {
            match map.put(&stored.to_le_bytes(), &[7u8; 16]) {
                Ok(()) => stored += 1,
                Err(e) => break e,
            }
            assert!(stored < 100, "slab never filled");
        };
        assert!(matches!(failure, Error::AllocationFailed { .. }));

        assert_eq!(map.len(), stored as usize);
        assert_eq!(map.size(), stored as u64 * (4 + 16));
        assert!(!map.contains_key(&stored.to_le_bytes()));
        for i in 0..stored {
            assert_eq!(map.get(&i.to_le_bytes()), Some(vec![7u8; 16]));
        }
    }

    #[test]
    fn test_unbounded_map_uses_plain_nodes() {
        let map = OffHeapMap::new(config().with_policy(PolicyKind::None)).unwrap();
        map.put(b"k", b"v").unwrap();
        let expected = Bucket::header_size() + NODE.size() + (4 + 1) * 2;
        assert_eq!(map.stats().slab_used, expected);
    }

    #[test]
    fn test_clear_frees_entries() {
        let (map, evicted) = bounded(1 << 20);
        for i in 0..100u32 {
            map.put(&i.to_le_bytes(), b"payload").unwrap();
        }
        map.clear();

        assert!(map.is_empty());
        assert_eq!(map.size(), 0);
        assert!(evicted.keys.lock().is_empty());
        let stats = map.stats();
        assert_eq!(stats.slab_used, stats.buckets_in_use * Bucket::header_size());

        map.put(b"again", b"works").unwrap();
        assert_eq!(map.get(b"again").as_deref(), Some(&b"works"[..]));
    }

    #[test]
    fn test_drop_releases_shared_slab() {
        let slab = Arc::new(Slab::best_fit(1 << 16).unwrap());
        {
            let map = OffHeapMap::builder(config())
                .slab(Arc::clone(&slab))
                .build()
                .unwrap();
            for i in 0..20u32 {
                map.put(&i.to_le_bytes(), b"x").unwrap();
            }
            assert!(slab.used() > 0);
        }
        assert_eq!(slab.used(), 0);
    }

    #[test]
    fn test_custom_eviction_function() {
        struct MaxEntries(u64);

        impl EvictionFunction for MaxEntries {
            fn should_evict_on_new_entry(&self, _: u64, _: u64, state: &MapState) -> bool {
                state.entries + 1 > self.0
            }

            fn should_evict_on_update(&self, _: u64, _: u64, _: &MapState) -> bool {
                false
            }

            fn should_evict(&self, state: &MapState) -> bool {
                state.entries > self.0
            }
        }

        let map = OffHeapMap::builder(config())
            .eviction_function(Box::new(MaxEntries(2)))
            .build()
            .unwrap();
        for key in [b"a", b"b", b"c", b"d"] {
            map.put(key, b"some value").unwrap();
        }
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(b"c"));
        assert!(map.contains_key(b"d"));
    }

    #[test]
    fn test_concurrent_puts_and_gets() {
        let map = OffHeapMap::new(config().with_buckets(8)).unwrap();
        std::thread::scope(|s| {
            for t in 0..4u32 {
                let map = &map;
                s.spawn(move || {
                    for i in 0..250u32 {
                        let key = (t * 1000 + i).to_le_bytes();
                        map.put(&key, &i.to_le_bytes()).unwrap();
                        assert_eq!(map.get(&key), Some(i.to_le_bytes().to_vec()));
                    }
                });
            }
        });
        assert_eq!(map.len(), 1000);
        assert_eq!(map.size(), 1000 * 8);
    }

    #[test]
    fn test_concurrent_eviction_accounting() {
        let (map, evicted) = bounded(400);
        std::thread::scope(|s| {
            for t in 0..4u64 {
                let map = &map;
                s.spawn(move || {
                    let mut rng = Lcg(t + 1);
                    for _ in 0..500 {
                        let key = format!("k{}", rng.next() % 80).into_bytes();
                        match rng.next() % 5 {
                            0 => {
                                map.remove(&key);
                            }
                            1 | 2 => {
                                map.get(&key);
                            }
                            _ => {
                                let value = vec![1u8; (rng.next() % 20) as usize];
                                map.put(&key, &value).unwrap();
                            }
                        }
                    }
                });
            }
        });

        assert!(map.size() <= 400);
        let live: u64 = (0..80)
            .filter_map(|i| {
                let key = format!("k{i}").into_bytes();
                map.get(&key).map(|v| (key.len() + v.len()) as u64)
            })
            .sum();
        assert_eq!(map.size(), live);
        assert!(!evicted.keys.lock().is_empty());
    }

    #[test]
    fn test_concurrent_bucket_creation() {
        let map = OffHeapMap::new(config().with_buckets(64)).unwrap();
        std::thread::scope(|s| {
            for t in 0..8u32 {
                let map = &map;
                s.spawn(move || {
                    for i in 0..64u32 {
                        map.put(&(t * 64 + i).to_le_bytes(), b"v").unwrap();
                    }
                });
            }
        });
        assert_eq!(map.len(), 512);

        map.clear();
        let stats = map.stats();
        assert!(stats.buckets_in_use <= 64);
        assert_eq!(stats.slab_used, stats.buckets_in_use * Bucket::header_size());
    }
}
