use thiserror::Error;

/// Errors surfaced by the allocator and the map.
///
/// Only allocation failure is expected at runtime. Structural corruption
/// (double free, dangling address, broken recency list) panics instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("allocation of {requested} bytes failed (largest free range: {largest_free} bytes)")]
    AllocationFailed { requested: u64, largest_free: u64 },

    #[error("memory map error: {0}")]
    Mmap(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
