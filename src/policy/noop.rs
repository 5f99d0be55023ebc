use super::{CacheAction, CachePolicy, CachePolicyKey};
use crate::memory::Address;

/// Policy for unbounded maps: tracks nothing and never names a victim.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCachePolicy;

impl NoopCachePolicy {
    fn keep(key: CachePolicyKey) -> CacheAction {
        CacheAction {
            policy_key: key,
            should_evict: false,
            token_to_evict: Address::NONE,
        }
    }
}

impl CachePolicy for NoopCachePolicy {
    fn add_entry(&self, entry: Address, _should_evict: bool) -> CacheAction {
        Self::keep(CachePolicyKey::new(entry))
    }

    fn update_entry(&self, key: CachePolicyKey, _should_evict: bool) -> Option<CacheAction> {
        Some(Self::keep(key))
    }

    fn remove_entry(&self, key: CachePolicyKey, _should_evict: bool) -> Option<CacheAction> {
        Some(Self::keep(key))
    }

    fn evict(&self) -> Option<CacheAction> {
        None
    }

    fn len(&self) -> usize {
        0
    }
}
