//! Half-open index ranges into the unified particle index space.

use std::ops::Range;

/// Contiguous range `[start, end)` of particle indices owned by one family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FamilySlice {
    /// First index in the slice.
    pub start: usize,
    /// One past the last index in the slice.
    pub end: usize,
}

impl FamilySlice {
    /// Create a slice. `end` must not be less than `start`.
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "slice end {end} before start {start}");
        Self { start, end }
    }

    /// Number of particles in the slice.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the slice holds no particles.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The slice as a standard range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Whether a global index falls inside the slice.
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }
}

impl From<FamilySlice> for Range<usize> {
    fn from(s: FamilySlice) -> Self {
        s.range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slice_contains_nothing() {
        let s = FamilySlice::new(5, 5);
        assert!(s.is_empty());
        assert!(!s.contains(5));
    }

    #[test]
    fn contains_is_half_open() {
        let s = FamilySlice::new(10, 20);
        assert_eq!(s.len(), 10);
        assert!(s.contains(10));
        assert!(s.contains(19));
        assert!(!s.contains(20));
        assert_eq!(Range::from(s), 10..20);
    }
}
