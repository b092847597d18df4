//! Storage-backend contract for hierarchical shard files.
//!
//! The snapshot layer never touches files directly. It reads through a
//! [`ShardStore`] (which opens shards) and the [`ShardHandle`]s it
//! returns (which expose groups, attributes and datasets). Paths inside
//! a shard are slash-delimited (`"PartType0/Coordinates"`); the empty
//! string names the root group.

use std::path::Path;

use smallvec::SmallVec;

use crate::array::{ArrayData, Dtype};
use crate::error::StoreError;
use crate::meta::MetaValue;

/// Dataset shape: first axis is rows, optional second axis is width.
pub type Shape = SmallVec<[usize; 2]>;

/// Type and shape of a dataset, available without reading its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetInfo {
    /// Element type.
    pub dtype: Dtype,
    /// Dimensions, outermost first.
    pub shape: Shape,
}

impl DatasetInfo {
    /// Length of the first axis (1 for a scalar dataset).
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Length of the second axis, or 1 when the dataset is one-dimensional.
    pub fn width(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(1)
    }

    /// Total number of elements.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Opens shard files.
pub trait ShardStore {
    /// Whether `path` names a container this store can open.
    fn probe(&self, path: &Path) -> bool;

    /// Open the container at `path`.
    ///
    /// Fails with [`StoreError::NotAContainer`] when `path` does not name
    /// a valid container.
    fn open(&self, path: &Path) -> Result<Box<dyn ShardHandle>, StoreError>;
}

/// Read access to one opened shard.
///
/// Dropping the handle closes the shard.
pub trait ShardHandle: Send {
    /// Path the shard was opened from.
    fn path(&self) -> &Path;

    /// Names of the immediate children (groups and datasets) of `group`.
    fn keys(&self, group: &str) -> Result<Vec<String>, StoreError>;

    /// Whether `path` names a group.
    fn is_group(&self, path: &str) -> bool;

    /// Attribute `name` of `group`.
    ///
    /// Returns `Ok(None)` when the group exists but lacks the attribute,
    /// and [`StoreError::MissingGroup`] when the group itself is absent.
    fn attribute(&self, group: &str, name: &str) -> Result<Option<MetaValue>, StoreError>;

    /// Names of every attribute on `group`, in stored order.
    fn attribute_names(&self, group: &str) -> Result<Vec<String>, StoreError>;

    /// Paths (relative to `group`) of every dataset below `group`.
    ///
    /// Recurses into nested groups; the groups themselves are not listed.
    fn walk_datasets(&self, group: &str) -> Result<Vec<String>, StoreError>;

    /// Type and shape of the dataset at `path`.
    fn dataset_info(&self, path: &str) -> Result<DatasetInfo, StoreError>;

    /// Read the whole dataset at `path`, flattened row-major.
    fn read_dataset(&self, path: &str) -> Result<ArrayData, StoreError>;
}

/// Join two slash-delimited shard paths, treating `""` as the root.
pub fn join_path(base: &str, child: &str) -> String {
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_owned(),
        (false, true) => base.to_owned(),
        (false, false) => format!("{}/{}", base.trim_end_matches('/'), child),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn join_path_handles_root() {
        assert_eq!(join_path("", "PartType0"), "PartType0");
        assert_eq!(join_path("FOF", ""), "FOF");
        assert_eq!(join_path("FOF/", "PartType1"), "FOF/PartType1");
    }

    #[test]
    fn dataset_info_axes() {
        let vec3 = DatasetInfo {
            dtype: Dtype::F32,
            shape: smallvec![10, 3],
        };
        assert_eq!((vec3.rows(), vec3.width(), vec3.element_count()), (10, 3, 30));

        let flat = DatasetInfo {
            dtype: Dtype::F64,
            shape: smallvec![30],
        };
        assert_eq!((flat.rows(), flat.width()), (30, 1));
    }
}
