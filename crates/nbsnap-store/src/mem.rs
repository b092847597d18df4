//! In-memory hierarchical store.
//!
//! A [`MemStore`] maps paths to [`MemFile`]s, each a tree of groups
//! carrying attributes and typed datasets. Files are shared behind
//! `Arc`, so opening a shard is cheap and the store can report how many
//! handles to a file are still alive.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::smallvec;
use tracing::trace;

use nbsnap_core::store::join_path;
use nbsnap_core::{ArrayData, DatasetInfo, MetaValue, Shape, ShardHandle, ShardStore, StoreError};

/// A dataset held in memory: flat row-major data plus its shape.
#[derive(Clone, Debug, PartialEq)]
pub struct MemDataset {
    data: ArrayData,
    shape: Shape,
}

impl MemDataset {
    /// Dataset with an explicit shape. The shape's product must equal
    /// the element count.
    pub fn new(data: ArrayData, shape: Shape) -> Result<Self, StoreError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(StoreError::Backend {
                reason: format!(
                    "shape {:?} needs {expected} elements, got {}",
                    shape.as_slice(),
                    data.len()
                ),
            });
        }
        Ok(Self { data, shape })
    }

    /// One-dimensional dataset.
    pub fn flat(data: ArrayData) -> Self {
        let shape = smallvec![data.len()];
        Self { data, shape }
    }

    /// Two-dimensional dataset of `width` columns.
    pub fn rows(data: ArrayData, width: usize) -> Result<Self, StoreError> {
        if width == 0 || data.len() % width != 0 {
            return Err(StoreError::Backend {
                reason: format!("{} elements do not divide into rows of {width}", data.len()),
            });
        }
        let shape = smallvec![data.len() / width, width];
        Ok(Self { data, shape })
    }

    /// Type and shape.
    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            dtype: self.data.dtype(),
            shape: self.shape.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct MemGroup {
    attrs: IndexMap<String, MetaValue>,
    children: IndexMap<String, MemNode>,
}

/// A child entry: a dataset when `dataset` is set, a group otherwise.
#[derive(Clone, Debug, Default)]
struct MemNode {
    group: MemGroup,
    dataset: Option<MemDataset>,
}

impl MemNode {
    fn dataset(dataset: MemDataset) -> Self {
        Self {
            group: MemGroup::default(),
            dataset: Some(dataset),
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl MemGroup {
    fn group(&self, path: &str) -> Option<&MemGroup> {
        let mut cur = self;
        for seg in segments(path) {
            let node = cur.children.get(seg)?;
            if node.dataset.is_some() {
                return None;
            }
            cur = &node.group;
        }
        Some(cur)
    }

    fn dataset(&self, path: &str) -> Option<&MemDataset> {
        let trimmed = path.trim_matches('/');
        let (parent, leaf) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        self.group(parent)?.children.get(leaf)?.dataset.as_ref()
    }

    fn ensure_group(&mut self, path: &str) -> &mut MemGroup {
        let mut cur = self;
        for seg in segments(path) {
            let node = cur.children.entry(seg.to_owned()).or_default();
            // A group created over a dataset replaces it.
            node.dataset = None;
            cur = &mut node.group;
        }
        cur
    }

    fn collect_datasets(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, node) in &self.children {
            let path = join_path(prefix, name);
            match node.dataset {
                Some(_) => out.push(path),
                None => node.group.collect_datasets(&path, out),
            }
        }
    }
}

/// One in-memory shard file.
#[derive(Clone, Debug, Default)]
pub struct MemFile {
    root: MemGroup,
}

impl MemFile {
    /// An empty file with only a root group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `path` and any missing parent groups.
    pub fn add_group(&mut self, path: &str) -> &mut Self {
        self.root.ensure_group(path);
        self
    }

    /// Set attribute `name` on `group`, creating the group if needed.
    pub fn set_attr(
        &mut self,
        group: &str,
        name: &str,
        value: impl Into<MetaValue>,
    ) -> &mut Self {
        self.root
            .ensure_group(group)
            .attrs
            .insert(name.to_owned(), value.into());
        self
    }

    /// Store `dataset` at `path`, creating parent groups as needed.
    pub fn insert_dataset(&mut self, path: &str, dataset: MemDataset) -> &mut Self {
        let trimmed = path.trim_matches('/');
        let (parent, leaf) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        self.root
            .ensure_group(parent)
            .children
            .insert(leaf.to_owned(), MemNode::dataset(dataset));
        self
    }

    /// Remove whatever is stored at `path`. Returns whether anything was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        let trimmed = path.trim_matches('/');
        let (parent, leaf) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        if self.root.group(parent).is_none() {
            return false;
        }
        self.root
            .ensure_group(parent)
            .children
            .shift_remove(leaf)
            .is_some()
    }
}

/// A set of in-memory shard files addressed by path.
#[derive(Debug, Default)]
pub struct MemStore {
    files: HashMap<PathBuf, Arc<MemFile>>,
}

impl MemStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` under `path`, replacing any previous file there.
    pub fn insert(&mut self, path: impl Into<PathBuf>, file: MemFile) {
        self.files.insert(path.into(), Arc::new(file));
    }

    /// Number of files in the store.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the store holds no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of handles to the file at `path` that are still open.
    pub fn open_handles(&self, path: &Path) -> usize {
        self.files
            .get(path)
            .map(|f| Arc::strong_count(f) - 1)
            .unwrap_or(0)
    }

    /// Total open handles across every file.
    pub fn total_open_handles(&self) -> usize {
        self.files.values().map(|f| Arc::strong_count(f) - 1).sum()
    }
}

impl ShardStore for MemStore {
    fn probe(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ShardHandle>, StoreError> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| StoreError::NotAContainer {
                path: path.to_path_buf(),
            })?;
        trace!(path = %path.display(), "opening in-memory shard");
        Ok(Box::new(MemHandle {
            path: path.to_path_buf(),
            file: Arc::clone(file),
        }))
    }
}

/// Open handle to a [`MemFile`].
#[derive(Debug)]
struct MemHandle {
    path: PathBuf,
    file: Arc<MemFile>,
}

impl MemHandle {
    fn group(&self, path: &str) -> Result<&MemGroup, StoreError> {
        self.file
            .root
            .group(path)
            .ok_or_else(|| StoreError::MissingGroup {
                path: path.to_owned(),
            })
    }

    fn dataset(&self, path: &str) -> Result<&MemDataset, StoreError> {
        self.file
            .root
            .dataset(path)
            .ok_or_else(|| StoreError::MissingDataset {
                path: path.to_owned(),
            })
    }
}

impl ShardHandle for MemHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn keys(&self, group: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.group(group)?.children.keys().cloned().collect())
    }

    fn is_group(&self, path: &str) -> bool {
        self.file.root.group(path).is_some()
    }

    fn attribute(&self, group: &str, name: &str) -> Result<Option<MetaValue>, StoreError> {
        Ok(self.group(group)?.attrs.get(name).cloned())
    }

    fn attribute_names(&self, group: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.group(group)?.attrs.keys().cloned().collect())
    }

    fn walk_datasets(&self, group: &str) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        self.group(group)?.collect_datasets("", &mut out);
        Ok(out)
    }

    fn dataset_info(&self, path: &str) -> Result<DatasetInfo, StoreError> {
        Ok(self.dataset(path)?.info())
    }

    fn read_dataset(&self, path: &str) -> Result<ArrayData, StoreError> {
        Ok(self.dataset(path)?.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbsnap_core::Dtype;

    fn sample_file() -> MemFile {
        let mut f = MemFile::new();
        f.set_attr("Header", "NumFilesPerSnapshot", 1i64)
            .insert_dataset(
                "PartType0/Coordinates",
                MemDataset::rows(ArrayData::F32(vec![0.0; 6]), 3).unwrap(),
            )
            .insert_dataset(
                "PartType0/Chem/Iron",
                MemDataset::flat(ArrayData::F64(vec![1.0, 2.0])),
            );
        f
    }

    fn open(file: MemFile) -> (MemStore, Box<dyn ShardHandle>) {
        let mut store = MemStore::new();
        store.insert("snap.hdf5", file);
        let handle = store.open(Path::new("snap.hdf5")).unwrap();
        (store, handle)
    }

    #[test]
    fn probe_and_open() {
        let mut store = MemStore::new();
        store.insert("a.hdf5", MemFile::new());
        assert!(store.probe(Path::new("a.hdf5")));
        assert!(!store.probe(Path::new("b.hdf5")));
        assert!(matches!(
            store.open(Path::new("b.hdf5")),
            Err(StoreError::NotAContainer { .. })
        ));
    }

    #[test]
    fn keys_and_attributes() {
        let (_store, h) = open(sample_file());
        assert_eq!(h.keys("").unwrap(), vec!["Header", "PartType0"]);
        assert_eq!(
            h.attribute("Header", "NumFilesPerSnapshot").unwrap(),
            Some(MetaValue::Int(1))
        );
        assert_eq!(h.attribute("Header", "Missing").unwrap(), None);
        assert!(matches!(
            h.attribute("Nope", "x"),
            Err(StoreError::MissingGroup { .. })
        ));
        assert!(h.is_group("PartType0/Chem"));
        assert!(!h.is_group("PartType0/Coordinates"));
    }

    #[test]
    fn walk_lists_nested_leaves_only() {
        let (_store, h) = open(sample_file());
        assert_eq!(
            h.walk_datasets("PartType0").unwrap(),
            vec!["Coordinates", "Chem/Iron"]
        );
    }

    #[test]
    fn dataset_info_and_read() {
        let (_store, h) = open(sample_file());
        let info = h.dataset_info("PartType0/Coordinates").unwrap();
        assert_eq!(info.dtype, Dtype::F32);
        assert_eq!(info.shape.as_slice(), &[2, 3]);
        assert_eq!(
            h.read_dataset("PartType0/Chem/Iron").unwrap(),
            ArrayData::F64(vec![1.0, 2.0])
        );
        assert!(matches!(
            h.read_dataset("PartType0/Chem"),
            Err(StoreError::MissingDataset { .. })
        ));
    }

    #[test]
    fn open_handles_tracks_drops() {
        let (store, h) = open(sample_file());
        assert_eq!(store.open_handles(Path::new("snap.hdf5")), 1);
        drop(h);
        assert_eq!(store.total_open_handles(), 0);
    }

    #[test]
    fn remove_drops_entries() {
        let mut f = sample_file();
        assert!(f.remove("PartType0/Chem/Iron"));
        assert!(!f.remove("PartType0/Chem/Iron"));
        assert!(!f.remove("Nope/x"));
    }

    #[test]
    fn group_created_over_dataset_replaces_it() {
        let mut f = sample_file();
        f.set_attr("PartType0/Coordinates/Sub", "k", 1i64);
        let (_store, h) = open(f);
        assert!(h.is_group("PartType0/Coordinates"));
        assert!(h.is_group("PartType0/Coordinates/Sub"));
        assert!(matches!(
            h.dataset_info("PartType0/Coordinates"),
            Err(StoreError::MissingDataset { .. })
        ));
        assert_eq!(h.walk_datasets("PartType0").unwrap(), vec!["Chem/Iron"]);
    }

    #[test]
    fn dataset_shape_must_match_data() {
        assert!(MemDataset::new(ArrayData::I32(vec![1, 2, 3]), smallvec![2, 2]).is_err());
        assert!(MemDataset::rows(ArrayData::I32(vec![1, 2, 3]), 2).is_err());
    }
}
