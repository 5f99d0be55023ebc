use std::fmt;

/// Inclusive interval of arena offsets: `[lower, upper]`.
///
/// Ranges order by `lower`, then `upper`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    lower: u64,
    upper: u64,
}

impl Range {
    pub fn new(lower: u64, upper: u64) -> Self {
        assert!(lower <= upper, "range lower {lower} above upper {upper}");
        Range { lower, upper }
    }

    /// Range covering `size` bytes starting at `offset`. `size` must be non-zero.
    pub fn with_size(offset: u64, size: u64) -> Self {
        assert!(size > 0, "zero-sized range at {offset}");
        Range::new(offset, offset + size - 1)
    }

    #[inline]
    pub fn lower(&self) -> u64 {
        self.lower
    }

    #[inline]
    pub fn upper(&self) -> u64 {
        self.upper
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.upper - self.lower + 1
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.lower <= offset && offset <= self.upper
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.lower <= other.upper && other.lower <= self.upper
    }

    /// True when the two ranges touch without overlapping.
    pub fn is_adjacent_to(&self, other: &Range) -> bool {
        self.upper.checked_add(1) == Some(other.lower)
            || other.upper.checked_add(1) == Some(self.lower)
    }

    /// Smallest range covering both.
    pub fn span(&self, other: &Range) -> Range {
        Range::new(self.lower.min(other.lower), self.upper.max(other.upper))
    }

    /// Carve `offset` bytes off the front. Returns `None` when nothing remains.
    pub fn shave(&self, offset: u64) -> Option<Range> {
        if offset >= self.size() {
            None
        } else {
            Some(Range::new(self.lower + offset, self.upper))
        }
    }

    /// Grow the upper bound by `size` bytes.
    pub fn extend(&self, size: u64) -> Range {
        Range::new(self.lower, self.upper + size)
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}
