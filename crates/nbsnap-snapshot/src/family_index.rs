//! Contiguous per-family slices of the global particle index space.

use indexmap::IndexMap;

use nbsnap_core::{Family, FamilySlice};

use crate::shards::ParticleCounts;
use crate::types::TypeMap;

/// Assignment of one half-open index range to each present family.
///
/// Slices are laid out back to back in family iteration order: the
/// first starts at 0, each next one starts where the previous ends, and
/// the last ends at [`total`](Self::total). A family's length is the sum
/// of its on-disk types' counts over every shard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FamilyIndex {
    slices: IndexMap<Family, FamilySlice>,
    total: usize,
}

impl FamilyIndex {
    /// Lay out the families of `types` using `counts`.
    pub fn build(types: &TypeMap, counts: &ParticleCounts) -> Self {
        let mut slices = IndexMap::with_capacity(types.len());
        let mut cursor = 0;
        for (family, on_disk) in types.iter() {
            let len: usize = on_disk.iter().map(|t| counts.total(t)).sum();
            slices.insert(family.clone(), FamilySlice::new(cursor, cursor + len));
            cursor += len;
        }
        Self {
            slices,
            total: cursor,
        }
    }

    /// Slice of `family`, or `None` if it is not present.
    pub fn slice(&self, family: &Family) -> Option<FamilySlice> {
        self.slices.get(family).copied()
    }

    /// `(family, slice)` pairs in layout order.
    pub fn iter(&self) -> impl Iterator<Item = (&Family, FamilySlice)> {
        self.slices.iter().map(|(f, s)| (f, *s))
    }

    /// Families in layout order.
    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.slices.keys()
    }

    /// Total particle count over every family.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The family whose slice contains global `index`.
    pub fn family_of(&self, index: usize) -> Option<&Family> {
        self.slices
            .iter()
            .find(|(_, s)| s.contains(index))
            .map(|(f, _)| f)
    }
}
