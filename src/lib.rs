//! Off-heap key/value storage: a slab arena with an explicit free list,
//! typed record layouts over raw arena memory, and a bucketed hash map
//! whose entries are bounded by a pluggable recency policy.
pub mod bytes;
pub mod config;
pub mod error;
pub mod layout;
pub mod map;
pub mod memory;
pub mod policy;

pub use bytes::{ByteArray, OffHeapByteArray};
pub use config::MapConfig;
pub use error::{Error, Result};
pub use map::{
    AlwaysKeepEvictionFunction, EvictionCallback, EvictionFunction, MapStats,
    MaxMapSizeEvictionFunction, OffHeapMap, OffHeapMapBuilder,
};
pub use memory::{Address, ExtractorKind, Slab};
pub use policy::PolicyKind;
