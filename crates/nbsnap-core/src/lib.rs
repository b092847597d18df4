//! Core types and traits for the nbsnap snapshot reader.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the nbsnap workspace:
//! identifiers and families, family slices, typed particle arrays,
//! header metadata values, the storage-backend contract, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod array;
pub mod error;
pub mod id;
pub mod meta;
pub mod slice;
pub mod store;

pub use array::{ArrayData, Dtype, ParticleArray};
pub use error::{ConfigError, HaloError, SnapshotError, StoreError};
pub use id::{Family, HaloId, ShardId, SnapshotId};
pub use meta::MetaValue;
pub use slice::FamilySlice;
pub use store::{DatasetInfo, Shape, ShardHandle, ShardStore};
