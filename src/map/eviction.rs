//! Eviction decisions and notifications.
//!
//! An [`EvictionFunction`] decides, before each map mutation is applied to
//! the running totals, whether the mutation should push an entry out. An
//! [`EvictionCallback`] is told about every entry the map evicts.

/// Aggregate map state the predicates see.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MapState {
    /// Sum of key and value lengths over live entries.
    pub size_bytes: u64,
    pub entries: u64,
}

pub trait EvictionFunction: Send + Sync {
    /// A new entry of the given key and value lengths is about to be added.
    fn should_evict_on_new_entry(&self, key_len: u64, value_len: u64, state: &MapState) -> bool;

    /// An existing value is about to be replaced.
    fn should_evict_on_update(&self, old_value_len: u64, new_value_len: u64, state: &MapState)
        -> bool;

    /// Reads and removals.
    fn should_evict(&self, state: &MapState) -> bool;

    /// Checked after each eviction; keeps evicting while true.
    fn should_continue_evicting(&self, _state: &MapState) -> bool {
        false
    }
}

/// Bounds the aggregate key+value bytes.
#[derive(Clone, Copy, Debug)]
pub struct MaxMapSizeEvictionFunction {
    max_size_bytes: u64,
}

impl MaxMapSizeEvictionFunction {
    pub fn new(max_size_bytes: u64) -> Self {
        MaxMapSizeEvictionFunction { max_size_bytes }
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }
}

impl EvictionFunction for MaxMapSizeEvictionFunction {
    fn should_evict_on_new_entry(&self, key_len: u64, value_len: u64, state: &MapState) -> bool {
        state.size_bytes + key_len + value_len > self.max_size_bytes
    }

    fn should_evict_on_update(
        &self,
        old_value_len: u64,
        new_value_len: u64,
        state: &MapState,
    ) -> bool {
        (state.size_bytes + new_value_len).saturating_sub(old_value_len) > self.max_size_bytes
    }

    fn should_evict(&self, state: &MapState) -> bool {
        state.size_bytes > self.max_size_bytes
    }

    fn should_continue_evicting(&self, state: &MapState) -> bool {
        state.size_bytes > self.max_size_bytes
    }
}

/// Never evicts.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysKeepEvictionFunction;

impl EvictionFunction for AlwaysKeepEvictionFunction {
    fn should_evict_on_new_entry(&self, _: u64, _: u64, _: &MapState) -> bool {
        false
    }

    fn should_evict_on_update(&self, _: u64, _: u64, _: &MapState) -> bool {
        false
    }

    fn should_evict(&self, _: &MapState) -> bool {
        false
    }
}

/// Notified synchronously after an entry has been evicted and freed.
/// The slices are copies taken before the memory was released.
pub trait EvictionCallback: Send + Sync {
    fn key_evicted(&self, _key: &[u8]) {}
    fn value_evicted(&self, _value: &[u8]) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEvictionCallback;

impl EvictionCallback for NoopEvictionCallback {}
