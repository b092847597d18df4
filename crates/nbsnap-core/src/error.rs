//! Error types for the nbsnap snapshot reader.
//!
//! Organised by subsystem: storage backend, snapshot (layout and array
//! loading), halo catalogue, and format configuration.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::id::Family;

/// Errors from a storage backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The path does not name a container the backend can open.
    NotAContainer {
        /// The path that was probed.
        path: PathBuf,
    },
    /// A group was requested that the shard does not contain.
    MissingGroup {
        /// Slash-delimited group path.
        path: String,
    },
    /// A dataset was requested that the shard does not contain.
    MissingDataset {
        /// Slash-delimited dataset path.
        path: String,
    },
    /// A required attribute is absent.
    MissingAttribute {
        /// Group carrying the attribute.
        group: String,
        /// Attribute name.
        name: String,
    },
    /// The underlying storage library reported a failure.
    Backend {
        /// Description from the backend.
        reason: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAContainer { path } => {
                write!(f, "'{}' is not a valid container", path.display())
            }
            Self::MissingGroup { path } => write!(f, "no such group: '{path}'"),
            Self::MissingDataset { path } => write!(f, "no such dataset: '{path}'"),
            Self::MissingAttribute { group, name } => {
                write!(f, "group '{group}' has no attribute '{name}'")
            }
            Self::Backend { reason } => write!(f, "storage backend: {reason}"),
        }
    }
}

impl Error for StoreError {}

/// Errors from snapshot construction and array loading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotError {
    /// The requested array is not available on disk for the requested
    /// scope. Raised before any buffer is allocated.
    NotFound {
        /// Canonical array name.
        name: String,
        /// Family scope, or `None` for all families.
        family: Option<Family>,
    },
    /// The base path is neither a single container nor the first file
    /// of a sharded sequence.
    NoContainer {
        /// The base path as given.
        path: PathBuf,
    },
    /// The on-disk layout is inconsistent or cannot be interpreted.
    Format {
        /// Description of the inconsistency.
        reason: String,
    },
    /// A family was named that this snapshot does not contain.
    UnknownFamily {
        /// The unrecognised family.
        family: Family,
    },
    /// The storage backend failed.
    Store(StoreError),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name, family } => {
                write!(f, "array '{name}' not available on disk")?;
                if let Some(fam) = family {
                    write!(f, " for family '{fam}'")?;
                }
                Ok(())
            }
            Self::NoContainer { path } => write!(
                f,
                "'{}' is neither a snapshot file nor a sharded snapshot",
                path.display()
            ),
            Self::Format { reason } => write!(f, "format error: {reason}"),
            Self::UnknownFamily { family } => write!(f, "unknown family '{family}'"),
            Self::Store(e) => write!(f, "store: {e}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for SnapshotError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Errors from the halo catalogue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HaloError {
    /// The halo id is not in `[0, count)`.
    OutOfRange {
        /// The requested id.
        id: u64,
        /// Number of groups in the catalogue.
        count: u64,
    },
    /// The parent snapshot has been released.
    ParentReleased,
    /// The group-catalogue tables are inconsistent.
    Format {
        /// Description of the inconsistency.
        reason: String,
    },
    /// A snapshot operation failed.
    Snapshot(SnapshotError),
}

impl fmt::Display for HaloError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { id, count } => {
                write!(f, "group {id} does not exist (catalogue has {count})")
            }
            Self::ParentReleased => write!(f, "parent snapshot has been released"),
            Self::Format { reason } => write!(f, "group catalogue format error: {reason}"),
            Self::Snapshot(e) => write!(f, "snapshot: {e}"),
        }
    }
}

impl Error for HaloError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SnapshotError> for HaloError {
    fn from(e: SnapshotError) -> Self {
        Self::Snapshot(e)
    }
}

impl From<StoreError> for HaloError {
    fn from(e: StoreError) -> Self {
        Self::Snapshot(SnapshotError::Store(e))
    }
}

/// Errors detected while building or validating format tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The family table lists no families.
    NoFamilies,
    /// A family maps to an empty list of on-disk types.
    EmptyFamily {
        /// The family with no types.
        family: Family,
    },
    /// One on-disk type is claimed by two families.
    DuplicateType {
        /// The on-disk type name.
        on_disk: String,
        /// First family that claimed it.
        first: Family,
        /// Second family that claimed it.
        second: Family,
    },
    /// Two on-disk names translate to the same canonical name.
    NameCollision {
        /// The shared canonical name.
        canonical: String,
    },
    /// No configuration is registered under the format id.
    UnknownFormat {
        /// The requested format id.
        format: String,
    },
    /// The configuration source could not be parsed.
    Parse {
        /// Parser message.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFamilies => write!(f, "type table lists no families"),
            Self::EmptyFamily { family } => {
                write!(f, "family '{family}' maps to no on-disk types")
            }
            Self::DuplicateType {
                on_disk,
                first,
                second,
            } => write!(
                f,
                "on-disk type '{on_disk}' claimed by both '{first}' and '{second}'"
            ),
            Self::NameCollision { canonical } => {
                write!(f, "several on-disk names translate to '{canonical}'")
            }
            Self::UnknownFormat { format } => write!(f, "no tables for format '{format}'"),
            Self::Parse { reason } => write!(f, "config parse error: {reason}"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_mentions_family() {
        let e = SnapshotError::NotFound {
            name: "rho".into(),
            family: Some(Family::from("gas")),
        };
        assert_eq!(e.to_string(), "array 'rho' not available on disk for family 'gas'");
    }

    #[test]
    fn store_errors_chain_through_halo_errors() {
        let e = HaloError::from(StoreError::MissingDataset {
            path: "FOF/PartType0/Offset".into(),
        });
        let source = e.source().unwrap();
        assert!(source.to_string().contains("FOF/PartType0/Offset"));
    }
}
