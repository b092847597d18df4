//! Halo (group) catalogues over group-catalogue snapshots.
//!
//! A structure finder assigns particles to groups and records, per
//! particle type and per shard, each group's offset and length within
//! that type. [`HaloCatalogue`] concatenates those tables and turns a
//! group id into the global particle indices of a [`Halo`].
//!
//! The catalogue holds a non-owning [`SnapshotHandle`](nbsnap_snapshot::SnapshotHandle):
//! once the parent snapshot is released, every resolution fails with
//! [`HaloError::ParentReleased`](nbsnap_core::HaloError::ParentReleased).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod catalogue;
pub mod halo;

pub use catalogue::HaloCatalogue;
pub use halo::Halo;
