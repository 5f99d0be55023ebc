//! Free-range bookkeeping for one contiguous arena.
//!
//! The same set of disjoint ranges is kept in two indices: by start offset
//! (neighbour lookup when coalescing) and by `(size, lower)` (allocation
//! selection). No two stored ranges are ever adjacent or overlapping.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use super::range::Range;
use crate::error::{Error, Result};

/// Entry in the size index. Ties on size break on the lower bound so that
/// equally sized ranges coexist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SizeKey {
    pub size: u64,
    pub lower: u64,
}

impl From<Range> for SizeKey {
    fn from(range: Range) -> Self {
        SizeKey {
            size: range.size(),
            lower: range.lower(),
        }
    }
}

/// Chooses which free range an allocation of `size` bytes is carved from.
pub trait RangeExtractor: Send + Sync + fmt::Debug {
    /// Return a range of at least `size` bytes, or `None` if none qualifies.
    fn extract(&self, size: u64, by_size: &BTreeSet<SizeKey>) -> Option<SizeKey>;
}

/// Smallest range that still fits.
#[derive(Clone, Copy, Debug, Default)]
pub struct BestFit;

impl RangeExtractor for BestFit {
    fn extract(&self, size: u64, by_size: &BTreeSet<SizeKey>) -> Option<SizeKey> {
        by_size.range(SizeKey { size, lower: 0 }..).next().copied()
    }
}

/// Always the largest range, if it fits.
#[derive(Clone, Copy, Debug, Default)]
pub struct LargestFit;

impl RangeExtractor for LargestFit {
    fn extract(&self, size: u64, by_size: &BTreeSet<SizeKey>) -> Option<SizeKey> {
        by_size.last().filter(|key| key.size >= size).copied()
    }
}

/// Named extractor choice, for configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExtractorKind {
    #[default]
    BestFit,
    LargestFit,
}

impl ExtractorKind {
    pub fn extractor(self) -> Box<dyn RangeExtractor> {
        match self {
            ExtractorKind::BestFit => Box::new(BestFit),
            ExtractorKind::LargestFit => Box::new(LargestFit),
        }
    }
}

/// Result of a partial allocation: `size` may be smaller than requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub offset: u64,
    pub size: u64,
}

pub struct FreeList {
    by_start: BTreeMap<u64, Range>,
    by_size: BTreeSet<SizeKey>,
    extractor: Box<dyn RangeExtractor>,
    capacity: u64,
    free_bytes: u64,
}

impl FreeList {
    pub fn new(capacity: u64, extractor: Box<dyn RangeExtractor>) -> Self {
        let mut list = FreeList {
            by_start: BTreeMap::new(),
            by_size: BTreeSet::new(),
            extractor,
            capacity: 0,
            free_bytes: 0,
        };
        list.reset(capacity);
        list
    }

    pub fn best_fit(capacity: u64) -> Self {
        FreeList::new(capacity, Box::new(BestFit))
    }

    pub fn largest_fit(capacity: u64) -> Self {
        FreeList::new(capacity, Box::new(LargestFit))
    }

    /// Total bytes managed, allocated or not.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn free_bytes(&self) -> u64 {
        self.free_bytes
    }

    /// Number of disjoint free ranges.
    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    pub fn largest_free(&self) -> u64 {
        self.by_size.last().map_or(0, |key| key.size)
    }

    /// Free ranges in address order.
    pub fn ranges(&self) -> Vec<Range> {
        self.by_start.values().copied().collect()
    }

    /// Drop all bookkeeping; the whole `[0, capacity)` becomes one free range.
    pub fn reset(&mut self, capacity: u64) {
        self.by_start.clear();
        self.by_size.clear();
        self.capacity = capacity;
        self.free_bytes = 0;
        if capacity > 0 {
            self.insert(Range::with_size(0, capacity));
        }
    }

    /// Append `size` bytes at the end of the arena, merging with a trailing free range.
    pub fn extend(&mut self, size: u64) {
        if size == 0 {
            return;
        }
        let added = Range::with_size(self.capacity, size);
        let merged = match self.by_start.last_key_value() {
            Some((_, last)) if last.is_adjacent_to(&added) => {
                let last = *last;
                self.take(last);
                last.extend(size)
            }
            _ => added,
        };
        self.insert(merged);
        self.capacity += size;
    }

    /// Return `[offset, offset + size)` to the free list.
    ///
    /// Panics if the range was not allocated (overlaps a free range or the
    /// arena end). That is a double free or a foreign address.
    pub fn free(&mut self, offset: u64, size: u64) {
        let mut range = Range::with_size(offset, size);
        assert!(
            range.upper() < self.capacity,
            "free of {range:?} past arena end {}",
            self.capacity
        );

        let lower = self.by_start.range(..offset).next_back().map(|(_, r)| *r);
        let higher = self.by_start.range(offset..).next().map(|(_, r)| *r);

        if let Some(lower) = lower {
            assert!(!range.overlaps(&lower), "free of {range:?} overlaps free {lower:?}");
            if range.is_adjacent_to(&lower) {
                self.take(lower);
                range = range.span(&lower);
            }
        }
        if let Some(higher) = higher {
            assert!(!range.overlaps(&higher), "free of {range:?} overlaps free {higher:?}");
            if range.is_adjacent_to(&higher) {
                self.take(higher);
                range = range.span(&higher);
            }
        }

        self.insert(range);
    }

    /// Allocate exactly `size` bytes. On failure the free list is unchanged.
    pub fn allocate(&mut self, size: u64) -> Result<u64> {
        assert!(size > 0, "zero-sized allocation");
        let Some(key) = self.extractor.extract(size, &self.by_size) else {
            let largest_free = self.largest_free();
            debug!(requested = size, largest_free, "free list allocation failed");
            return Err(Error::AllocationFailed {
                requested: size,
                largest_free,
            });
        };
        Ok(self.carve(key, size))
    }

    /// Allocate up to `size` bytes. When no range fits the whole request the
    /// largest range is handed out in full. `None` only when nothing is free.
    pub fn try_allocate(&mut self, size: u64) -> Option<Span> {
        assert!(size > 0, "zero-sized allocation");
        let key = self
            .extractor
            .extract(size, &self.by_size)
            .or_else(|| self.by_size.last().copied())?;
        let granted = key.size.min(size);
        Some(Span {
            offset: self.carve(key, granted),
            size: granted,
        })
    }

    fn carve(&mut self, key: SizeKey, size: u64) -> u64 {
        let range = self.by_start[&key.lower];
        self.take(range);
        if let Some(rest) = range.shave(size) {
            self.insert(rest);
        }
        range.lower()
    }

    fn insert(&mut self, range: Range) {
        self.by_start.insert(range.lower(), range);
        self.by_size.insert(range.into());
        self.free_bytes += range.size();
    }

    fn take(&mut self, range: Range) {
        let removed = self.by_start.remove(&range.lower());
        debug_assert_eq!(removed, Some(range));
        self.by_size.remove(&range.into());
        self.free_bytes -= range.size();
    }
}

impl fmt::Debug for FreeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("capacity", &self.capacity)
            .field("free_bytes", &self.free_bytes)
            .field("ranges", &self.ranges())
            .field("extractor", &self.extractor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn allocates_front_to_back() {
        let mut list = FreeList::best_fit(64 * MB);
        assert_eq!(list.allocate(100).unwrap(), 0);
        assert_eq!(list.allocate(100).unwrap(), 100);
        assert_eq!(list.allocate(500).unwrap(), 200);
        assert_eq!(list.allocate(1024).unwrap(), 700);
        assert_eq!(list.allocate(1024).unwrap(), 1724);
        assert_eq!(list.free_bytes(), 64 * MB - 2748);
    }

    #[test]
    fn boundary_allocation() {
        let mut list = FreeList::largest_fit(64 * MB);
        assert_eq!(list.allocate(32 * MB).unwrap(), 0);
        assert_eq!(list.allocate(32 * MB).unwrap(), 32 * MB);
        assert!(list.is_empty());
        assert_eq!(list.free_bytes(), 0);
    }

    #[test]
    fn free_coalesces_either_order() {
        for order in [[0u64, 10], [10, 0]] {
            let mut list = FreeList::best_fit(30);
            list.allocate(10).unwrap();
            list.allocate(10).unwrap();
            list.allocate(10).unwrap();
            assert!(list.is_empty());

            for offset in order {
                list.free(offset, 10);
            }
            assert_eq!(list.ranges(), vec![Range::new(0, 19)]);
            assert_eq!(list.free_bytes(), 20);
        }
    }

    #[test]
    fn free_merges_both_neighbours() {
        let mut list = FreeList::best_fit(30);
        for _ in 0..3 {
            list.allocate(10).unwrap();
        }
        list.free(0, 10);
        list.free(20, 10);
        assert_eq!(list.len(), 2);

        list.free(10, 10);
        assert_eq!(list.ranges(), vec![Range::new(0, 29)]);
    }

    #[test]
    fn contiguous_blocks_merge_back() {
        const BLOCK: u64 = 64;
        let mut list = FreeList::best_fit(1024 * MB);
        let start = list.ranges()[0];

        for i in 0..100 {
            assert_eq!(list.allocate(BLOCK).unwrap(), i * BLOCK);
        }
        for i in 0..100 {
            list.free(i * BLOCK, BLOCK);
            if i < 99 {
                assert_eq!(list.len(), 2);
            } else {
                assert_eq!(list.len(), 1);
            }
        }
        assert_eq!(list.ranges(), vec![start]);
    }

    #[test]
    fn equal_size_ranges_coexist() {
        let mut list = FreeList::best_fit(300);
        list.allocate(100).unwrap();
        list.allocate(100).unwrap();
        list.allocate(100).unwrap();
        list.free(0, 100);
        list.free(200, 100);

        assert_eq!(list.free_bytes(), 200);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn best_fit_picks_tightest() {
        let mut list = FreeList::best_fit(1000);
        list.allocate(1000).unwrap();
        list.free(0, 300);
        list.free(400, 50);
        list.free(600, 100);

        assert_eq!(list.allocate(40).unwrap(), 400);
        assert_eq!(list.allocate(100).unwrap(), 600);
        assert_eq!(list.allocate(100).unwrap(), 0);
    }

    #[test]
    fn largest_fit_picks_biggest() {
        let mut list = FreeList::largest_fit(1000);
        list.allocate(1000).unwrap();
        list.free(0, 300);
        list.free(400, 50);
        list.free(600, 100);

        assert_eq!(list.allocate(40).unwrap(), 0);
        assert_eq!(list.allocate(200).unwrap(), 40);
        assert!(list.allocate(200).is_err());
    }

    #[test]
    fn failed_allocation_keeps_remaining_bytes() {
        let mut list = FreeList::best_fit(1024);
        list.allocate(1024 - 100).unwrap();

        let before = list.ranges();
        match list.allocate(1024 - 200) {
            Err(Error::AllocationFailed {
                requested,
                largest_free,
            }) => {
                assert_eq!(requested, 824);
                assert_eq!(largest_free, 100);
            }
            other => panic!("expected allocation failure, got {other:?}"),
        }
        assert_eq!(list.ranges(), before);
        assert_eq!(list.free_bytes(), 100);
        assert_eq!(list.allocate(100).unwrap(), 924);
    }

    #[test]
    fn allocate_all() {
        let mut list = FreeList::best_fit(64 * MB);
        list.allocate(64 * MB).unwrap();
        assert_eq!(list.len(), 0);
        assert_eq!(list.free_bytes(), 0);
        assert!(list.allocate(1).is_err());
    }

    #[test]
    fn extend_merges_trailing_range() {
        let mut list = FreeList::best_fit(64 * MB);
        list.extend(64 * MB);
        assert_eq!(list.len(), 1);
        assert_eq!(list.allocate(128 * MB).unwrap(), 0);
    }

    #[test]
    fn extend_after_full_allocation() {
        let mut list = FreeList::best_fit(100);
        list.allocate(100).unwrap();
        list.extend(50);
        assert_eq!(list.ranges(), vec![Range::new(100, 149)]);
        assert_eq!(list.capacity(), 150);
        assert_eq!(list.allocate(50).unwrap(), 100);
    }

    #[test]
    fn try_allocate_partial() {
        let mut list = FreeList::best_fit(100);
        list.allocate(60).unwrap();

        let span = list.try_allocate(64).unwrap();
        assert_eq!(span, Span { offset: 60, size: 40 });
        assert!(list.try_allocate(1).is_none());
    }

    #[test]
    fn reset_restores_single_range() {
        let mut list = FreeList::best_fit(100);
        list.allocate(10).unwrap();
        list.allocate(10).unwrap();
        list.free(0, 10);

        list.reset(200);
        assert_eq!(list.ranges(), vec![Range::new(0, 199)]);
        assert_eq!(list.free_bytes(), 200);

        list.reset(0);
        assert!(list.is_empty());
    }

    #[test]
    fn churn_keeps_accounting() {
        let total = 128 * MB;
        let chunk = 10 * 1024;
        let mut list = FreeList::best_fit(total);
        let mut allocated = 0;
        let mut round: i64 = MB as i64;

        while allocated + chunk < total {
            list.allocate(chunk).unwrap();
            allocated += chunk;
            round -= chunk as i64;
            if round < 0 {
                let give_back = (-round) as u64;
                list.free(allocated - give_back, give_back);
                list.allocate(give_back).unwrap();
                round = MB as i64;
            }
        }
        assert_eq!(allocated, total - list.free_bytes());
    }

    #[test]
    #[should_panic(expected = "overlaps")]
    fn double_free_panics() {
        let mut list = FreeList::best_fit(100);
        list.allocate(50).unwrap();
        list.free(0, 50);
        list.free(0, 50);
    }
}
