//! Test utilities for nbsnap development.
//!
//! Provides synthetic multi-shard snapshots and group catalogues backed
//! by the in-memory store (see [`fixtures`]), and a logging hook for
//! tests that want to see `tracing` output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{CatalogueBuilder, CatalogueFixture, Fixture, SnapshotBuilder};

/// Route `tracing` events to the test writer (call once per test).
///
/// Honors `RUST_LOG`; defaults to `nbsnap=debug`.
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nbsnap=debug"));
    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}
