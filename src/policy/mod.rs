pub mod fifo;
pub mod list;
pub mod lru;
pub mod noop;

use crate::memory::Address;

pub use fifo::FifoCachePolicy;
pub use lru::LruCachePolicy;
pub use noop::NoopCachePolicy;

/// Handle a policy hands back for a tracked entry: the entry's own address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CachePolicyKey(Address);

impl CachePolicyKey {
    pub fn new(address: Address) -> Self {
        CachePolicyKey(address)
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

/// What the map must do after a policy mutation.
///
/// `token_to_evict` is the least recently used entry at the time of the
/// call and is reported even when `should_evict` is false. When
/// `should_evict` is true the token has already been detached from the
/// recency list; the map owns removing it from its bucket and freeing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheAction {
    pub policy_key: CachePolicyKey,
    pub should_evict: bool,
    pub token_to_evict: Address,
}

impl CacheAction {
    /// The address to evict, if this action calls for one.
    pub fn eviction(&self) -> Option<Address> {
        if self.should_evict {
            self.token_to_evict.some()
        } else {
            None
        }
    }
}

/// Recency bookkeeping over map entries.
///
/// Every mutation takes the map's eviction decision and returns the
/// resulting [`CacheAction`]. `update_entry` and `remove_entry` return
/// `None` when the entry is no longer tracked, which happens when an
/// eviction detached it and has not yet unlinked it from its bucket.
pub trait CachePolicy: Send + Sync {
    fn add_entry(&self, entry: Address, should_evict: bool) -> CacheAction;
    fn update_entry(&self, key: CachePolicyKey, should_evict: bool) -> Option<CacheAction>;
    fn remove_entry(&self, key: CachePolicyKey, should_evict: bool) -> Option<CacheAction>;
    /// Detach the current eviction candidate, if any.
    fn evict(&self) -> Option<CacheAction>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which policy a map runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolicyKind {
    #[default]
    Lru,
    Fifo,
    /// No recency tracking; entries are never evicted.
    None,
}

impl PolicyKind {
    /// Whether nodes need the extra recency link fields.
    pub fn tracks_recency(self) -> bool {
        !matches!(self, PolicyKind::None)
    }
}

/// Concrete enum wrapping all policies, dispatched without a vtable.
pub enum Policy {
    Lru(LruCachePolicy),
    Fifo(FifoCachePolicy),
    Noop(NoopCachePolicy),
}

impl Policy {
    #[inline(always)]
    pub fn add_entry(&self, entry: Address, should_evict: bool) -> CacheAction {
        match self {
            Self::Lru(p) => p.add_entry(entry, should_evict),
            Self::Fifo(p) => p.add_entry(entry, should_evict),
            Self::Noop(p) => p.add_entry(entry, should_evict),
        }
    }

    #[inline(always)]
    pub fn update_entry(&self, key: CachePolicyKey, should_evict: bool) -> Option<CacheAction> {
        match self {
            Self::Lru(p) => p.update_entry(key, should_evict),
            Self::Fifo(p) => p.update_entry(key, should_evict),
            Self::Noop(p) => p.update_entry(key, should_evict),
        }
    }

    #[inline(always)]
    pub fn remove_entry(&self, key: CachePolicyKey, should_evict: bool) -> Option<CacheAction> {
        match self {
            Self::Lru(p) => p.remove_entry(key, should_evict),
            Self::Fifo(p) => p.remove_entry(key, should_evict),
            Self::Noop(p) => p.remove_entry(key, should_evict),
        }
    }

    #[inline(always)]
    pub fn evict(&self) -> Option<CacheAction> {
        match self {
            Self::Lru(p) => p.evict(),
            Self::Fifo(p) => p.evict(),
            Self::Noop(p) => p.evict(),
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        match self {
            Self::Lru(p) => p.len(),
            Self::Fifo(p) => p.len(),
            Self::Noop(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Lru(_) => PolicyKind::Lru,
            Self::Fifo(_) => PolicyKind::Fifo,
            Self::Noop(_) => PolicyKind::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_requires_flag_and_token() {
        let key = CachePolicyKey::new(Address::new(1));
        let keep = CacheAction {
            policy_key: key,
            should_evict: false,
            token_to_evict: Address::new(8),
        };
        assert_eq!(keep.eviction(), None);

        let empty = CacheAction {
            policy_key: key,
            should_evict: true,
            token_to_evict: Address::NONE,
        };
        assert_eq!(empty.eviction(), None);

        let evict = CacheAction {
            should_evict: true,
            ..keep
        };
        assert_eq!(evict.eviction(), Some(Address::new(8)));
    }

    #[test]
    fn policy_kinds() {
        assert!(PolicyKind::Lru.tracks_recency());
        assert!(PolicyKind::Fifo.tracks_recency());
        assert!(!PolicyKind::None.tracks_recency());
        assert_eq!(PolicyKind::default(), PolicyKind::Lru);
        assert_eq!(Policy::Noop(NoopCachePolicy).kind(), PolicyKind::None);
    }
}
