//! Multi-shard particle snapshots with lazily loaded arrays.
//!
//! Presents a simulation snapshot split over many hierarchical shard
//! files as one logical particle collection. Particles are grouped into
//! families, each owning a contiguous slice of a single global index
//! space; per-particle arrays are read on first access from every shard
//! and cached.
//!
//! The pieces, bottom-up:
//!
//! - [`NameTranslator`] maps on-disk field names to canonical names.
//! - [`TypeMapper`] intersects the static family table with the type
//!   groups actually present, yielding a [`TypeMap`].
//! - [`ShardSet`] resolves and opens the shards and reads per-type
//!   [`ParticleCounts`].
//! - [`FamilyIndex`] lays the families out back to back.
//! - [`LazyArrayLoader`] plans and fills arrays.
//! - [`Snapshot`] ties them together, caches arrays, and runs the
//!   property and unit [`Initializer`]s.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod family_index;
pub mod loader;
pub mod names;
pub mod properties;
pub mod shards;
pub mod snapshot;
pub mod types;

pub use config::{
    FormatConfig, FormatRegistry, FormatTables, Hierarchy, ShapePolicy, SnapshotOptions,
};
pub use family_index::FamilyIndex;
pub use loader::{LazyArrayLoader, Layout, Loaded, ShapeWarning};
pub use names::NameTranslator;
pub use properties::{FileUnits, Initializer, Properties};
pub use shards::{ParticleCounts, ShardSet};
pub use snapshot::{Snapshot, SnapshotHandle};
pub use types::{type_index, TypeMap, TypeMapper};
