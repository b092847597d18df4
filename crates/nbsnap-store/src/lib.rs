//! Storage backends for the nbsnap snapshot reader.
//!
//! Both backends implement [`ShardStore`](nbsnap_core::ShardStore):
//!
//! - [`MemStore`] keeps shard files as in-memory group trees. It is
//!   always built and backs the test fixtures and benchmarks.
//! - `Hdf5Store` (cargo feature `hdf5`) reads real HDF5 files through
//!   the system HDF5 library.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

#[cfg(feature = "hdf5")]
pub mod h5;
pub mod mem;

#[cfg(feature = "hdf5")]
pub use h5::Hdf5Store;
pub use mem::{MemDataset, MemFile, MemStore};
