//! Benchmark profiles for the nbsnap snapshot reader.
//!
//! Provides pre-built in-memory shard sets for benchmarking:
//!
//! - [`reference_snapshot`]: 8 shards, 3 families, 120K particles
//! - [`stress_snapshot`]: 32 shards, 3 families, ~1M particles
//! - [`reference_catalogue`]: 8 shards, 4K groups over gas and dm

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use nbsnap_test_utils::{CatalogueBuilder, CatalogueFixture, Fixture, SnapshotBuilder};

/// Shards in [`reference_snapshot`] and [`reference_catalogue`].
pub const REFERENCE_SHARDS: usize = 8;

/// Shards in [`stress_snapshot`].
pub const STRESS_SHARDS: usize = 32;

/// Build a snapshot of `shards` shards with `per_shard` particles of
/// each of gas, dm and one star type, plus a gas `Density` field.
///
/// Dark matter takes its mass from the header table.
pub fn snapshot_profile(shards: usize, per_shard: usize, seed: u64) -> Fixture {
    let counts = vec![per_shard; shards];
    SnapshotBuilder::new("bench_snap", shards)
        .particles("PartType0", &counts)
        .particles("PartType1", &counts)
        .particles("PartType4", &counts)
        .table_mass("PartType1", 0.01)
        .field("PartType0", "Density", 1)
        .seed(seed)
        .build()
}

/// Reference profile: 8 shards of 5K particles per family (120K total).
pub fn reference_snapshot(seed: u64) -> Fixture {
    snapshot_profile(REFERENCE_SHARDS, 5_000, seed)
}

/// Stress profile: 32 shards of ~10K particles per family (~1M total).
pub fn stress_snapshot(seed: u64) -> Fixture {
    snapshot_profile(STRESS_SHARDS, 10_417, seed)
}

/// Reference catalogue: 500 groups per shard over 8 shards.
pub fn reference_catalogue(seed: u64) -> CatalogueFixture {
    CatalogueBuilder::new("bench_fof", &[500; REFERENCE_SHARDS])
        .max_len(64)
        .seed(seed)
        .build()
}
