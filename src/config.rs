//! Configuration for an [`OffHeapMap`](crate::OffHeapMap).

use crate::error::{Error, Result};
use crate::map::eviction::{AlwaysKeepEvictionFunction, EvictionFunction, MaxMapSizeEvictionFunction};
use crate::memory::ExtractorKind;
use crate::policy::PolicyKind;

/// Default number of bucket slots.
pub const DEFAULT_BUCKETS: usize = 1024;

/// Default arena size (64MB).
pub const DEFAULT_SLAB_CAPACITY: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Bucket slots; fixed for the life of the map.
    pub buckets: usize,
    /// Initial arena bytes when the map creates its own slab.
    pub slab_capacity: u64,
    /// Free-range selection strategy for that slab.
    pub extractor: ExtractorKind,
    /// Recency policy.
    pub policy: PolicyKind,
    /// Bound on aggregate key+value bytes. `None` keeps everything.
    pub max_size_bytes: Option<u64>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            buckets: DEFAULT_BUCKETS,
            slab_capacity: DEFAULT_SLAB_CAPACITY,
            extractor: ExtractorKind::default(),
            policy: PolicyKind::default(),
            max_size_bytes: None,
        }
    }
}

impl MapConfig {
    pub fn with_buckets(mut self, buckets: usize) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn with_slab_capacity(mut self, slab_capacity: u64) -> Self {
        self.slab_capacity = slab_capacity;
        self
    }

    pub fn with_extractor(mut self, extractor: ExtractorKind) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_size_bytes(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = Some(max_size_bytes);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buckets == 0 {
            return Err(Error::InvalidConfig("bucket count must be non-zero".into()));
        }
        if self.slab_capacity == 0 {
            return Err(Error::InvalidConfig("slab capacity must be non-zero".into()));
        }
        if self.max_size_bytes.is_some() && !self.policy.tracks_recency() {
            return Err(Error::InvalidConfig(
                "a size bound needs a recency policy to pick victims".into(),
            ));
        }
        Ok(())
    }

    /// The eviction function implied by `max_size_bytes`.
    pub fn eviction_function(&self) -> Box<dyn EvictionFunction> {
        match self.max_size_bytes {
            Some(max) => Box::new(MaxMapSizeEvictionFunction::new(max)),
            None => Box::new(AlwaysKeepEvictionFunction),
        }
    }
}
