//! nbsnap: a lazy, family-aware reader for multi-shard N-body snapshots.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! nbsnap sub-crates. For most users, adding `nbsnap` as a single dependency
//! is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use nbsnap::prelude::*;
//! use nbsnap::store::{MemDataset, MemFile};
//!
//! // A single-container snapshot with four dark-matter particles.
//! let mut file = MemFile::new();
//! file.set_attr("Header", "NumFilesPerSnapshot", 1i64)
//!     .set_attr("Header", "ExpansionFactor", 0.5)
//!     .insert_dataset(
//!         "PartType1/Coordinates",
//!         MemDataset::rows(ArrayData::F32(vec![0.0; 12]), 3).unwrap(),
//!     );
//! let mut store = MemStore::new();
//! store.insert("snap_000.hdf5", file);
//!
//! let mut snap = Snapshot::open_gadget(&store, "snap_000.hdf5").unwrap();
//! assert_eq!(snap.family_slice(&Family::from("dm")), Some(FamilySlice::new(0, 4)));
//! assert_eq!(snap.properties().get_f64("z"), Some(1.0));
//!
//! let pos = snap.load("pos", None).unwrap();
//! assert_eq!((pos.rows(), pos.dims()), (4, 3));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `nbsnap-core` | IDs, families, arrays, metadata, storage traits, errors |
//! | [`store`] | `nbsnap-store` | In-memory and HDF5 storage backends |
//! | [`snapshot`] | `nbsnap-snapshot` | Formats, layout, lazy loading, properties |
//! | [`halo`] | `nbsnap-halo` | Group catalogues and halo resolution |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`nbsnap-core`).
///
/// Contains families and slices, typed particle arrays, header values,
/// the [`types::ShardStore`] and [`types::ShardHandle`] storage contract,
/// and the error enums.
pub use nbsnap_core as types;

/// Storage backends (`nbsnap-store`).
///
/// [`store::MemStore`] keeps shards in memory. With the `hdf5` feature,
/// `store::Hdf5Store` reads real files.
pub use nbsnap_store as store;

/// Snapshots and lazy array loading (`nbsnap-snapshot`).
///
/// Open a [`snapshot::Snapshot`] from a store and a
/// [`snapshot::FormatConfig`], then load arrays by name and family.
pub use nbsnap_snapshot as snapshot;

/// Halo catalogues (`nbsnap-halo`).
///
/// Build a [`halo::HaloCatalogue`] over a group-catalogue snapshot and
/// resolve group ids to particle indices.
pub use nbsnap_halo as halo;

/// Common imports for typical nbsnap usage.
///
/// ```rust
/// use nbsnap::prelude::*;
/// ```
///
/// This imports the most frequently used types: snapshots and their
/// options, families and arrays, the storage trait with the in-memory
/// backend, errors, and halo catalogues.
pub mod prelude {
    // Core types
    pub use nbsnap_core::{
        ArrayData, Dtype, Family, FamilySlice, HaloId, MetaValue, ParticleArray, ShardStore,
        SnapshotId,
    };

    // Errors
    pub use nbsnap_core::{ConfigError, HaloError, SnapshotError, StoreError};

    // Storage
    pub use nbsnap_store::MemStore;

    // Snapshot
    pub use nbsnap_snapshot::{
        FormatConfig, FormatRegistry, ShapePolicy, Snapshot, SnapshotHandle, SnapshotOptions,
    };

    // Halo
    pub use nbsnap_halo::{Halo, HaloCatalogue};
}
