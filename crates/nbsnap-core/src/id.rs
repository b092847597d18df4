//! Strongly-typed identifiers and the [`Family`] name type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A logical particle species (gas, dark matter, stars, ...).
///
/// Families are defined by the format configuration and are immutable
/// once a snapshot is constructed. Iteration order is not a property of
/// the family itself but of the table that lists it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Family(String);

impl Family {
    /// Create a family from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The family's name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Family {
    fn from(v: &str) -> Self {
        Self(v.to_owned())
    }
}

impl From<String> for Family {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Ordinal position of a shard within a snapshot's shard sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(pub u32);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ShardId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Zero-based ordinal of a halo group in a group catalogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HaloId(pub u64);

impl fmt::Display for HaloId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for HaloId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Counter for unique [`SnapshotId`] allocation.
static SNAPSHOT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for an opened snapshot.
///
/// Allocated from a monotonic atomic counter, so two snapshots opened
/// from the same path still get different IDs. Halo catalogues record
/// the ID of the snapshot they were built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(u64);

impl SnapshotId {
    /// Allocate a fresh, unique snapshot ID. Thread-safe.
    pub fn next() -> Self {
        Self(SNAPSHOT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_ids_are_unique() {
        let a = SnapshotId::next();
        let b = SnapshotId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn family_displays_its_name() {
        let gas = Family::from("gas");
        assert_eq!(gas.to_string(), "gas");
        assert_eq!(gas.name(), "gas");
    }
}
