//! The ordered set of opened shards behind one logical snapshot.
//!
//! A snapshot is either a single container, or a sequence `P.0.<ext>`,
//! `P.1.<ext>`, ..., `P.<n-1>.<ext>` whose length `n` is read from the
//! first shard's header. Every shard is opened eagerly at construction
//! and all are closed together when the set is dropped.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use nbsnap_core::store::join_path;
use nbsnap_core::{ShardHandle, ShardId, ShardStore, SnapshotError, StoreError};

use crate::config::Hierarchy;
use crate::types::type_index;

/// Header group carrying snapshot-wide metadata.
pub const HEADER: &str = "Header";

/// Dataset whose first axis gives a type's particle count in an
/// ordinary snapshot.
pub const REFERENCE_DATASET: &str = "Coordinates";

/// Opened shards of one snapshot, in shard order. Never empty.
pub struct ShardSet {
    base: PathBuf,
    shards: Vec<Box<dyn ShardHandle>>,
}

impl std::fmt::Debug for ShardSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardSet")
            .field("base", &self.base)
            .field(
                "shards",
                &self.shards.iter().map(|s| s.path()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Path of shard `index` in the sequence rooted at `base`.
pub fn shard_path(base: &Path, index: usize, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}.{extension}"));
    PathBuf::from(name)
}

impl ShardSet {
    /// Resolve `base` to one or more shards and open them all.
    ///
    /// If `base` itself is a container, it is the only shard. Otherwise
    /// `base.0.<extension>` is opened and the shard count is read from
    /// its header (see [`Hierarchy`]); the remaining shards are then
    /// opened in order. Fails with [`SnapshotError::NoContainer`] when
    /// neither form exists.
    pub fn open(
        store: &dyn ShardStore,
        base: &Path,
        extension: &str,
        hierarchy: &Hierarchy,
    ) -> Result<Self, SnapshotError> {
        if store.probe(base) {
            debug!(path = %base.display(), "opening single-shard snapshot");
            let shard = store.open(base)?;
            return Ok(Self {
                base: base.to_path_buf(),
                shards: vec![shard],
            });
        }

        let first_path = shard_path(base, 0, extension);
        if !store.probe(&first_path) {
            return Err(SnapshotError::NoContainer {
                path: base.to_path_buf(),
            });
        }
        let first = store.open(&first_path)?;
        let count = shard_count(first.as_ref(), hierarchy)?;
        debug!(path = %base.display(), shards = count, "opening sharded snapshot");

        let mut shards = Vec::with_capacity(count);
        shards.push(first);
        for i in 1..count {
            shards.push(store.open(&shard_path(base, i, extension))?);
        }
        Ok(Self {
            base: base.to_path_buf(),
            shards,
        })
    }

    /// The path the snapshot was opened from.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Number of shards (at least 1).
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Always `false`; a shard set holds at least one shard.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// The reference shard, consulted for layout decisions.
    pub fn first(&self) -> &dyn ShardHandle {
        self.shards[0].as_ref()
    }

    /// Shard `id`, if it exists.
    pub fn get(&self, id: ShardId) -> Option<&dyn ShardHandle> {
        self.shards.get(id.0 as usize).map(|s| s.as_ref())
    }

    /// Shards in order, with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ShardId, &dyn ShardHandle)> {
        self.shards
            .iter()
            .enumerate()
            .map(|(i, s)| (ShardId(i as u32), s.as_ref()))
    }

    /// Count every listed type's particles in every shard.
    ///
    /// Ordinary snapshots take the count from the first axis of each
    /// type's reference dataset (a type group missing from a shard
    /// counts as zero). Group catalogues read the per-type
    /// `Number_per_Type` attribute of the sub-hierarchy root.
    pub fn particle_counts<'t>(
        &self,
        hierarchy: &Hierarchy,
        types: impl IntoIterator<Item = &'t str>,
    ) -> Result<ParticleCounts, SnapshotError> {
        let mut counts = IndexMap::new();
        for on_disk in types {
            let mut per_shard = Vec::with_capacity(self.shards.len());
            for shard in &self.shards {
                per_shard.push(declared_count(shard.as_ref(), hierarchy, on_disk)?);
            }
            counts.insert(on_disk.to_owned(), per_shard);
        }
        Ok(ParticleCounts { counts })
    }
}

fn shard_count(first: &dyn ShardHandle, hierarchy: &Hierarchy) -> Result<usize, SnapshotError> {
    let (group, attr) = match hierarchy {
        Hierarchy::Particles => (HEADER, "NumFilesPerSnapshot"),
        Hierarchy::GroupCatalogue { root } => (root.as_str(), "NTask"),
    };
    let mut value = first.attribute(group, attr).ok().flatten();
    if value.is_none() && hierarchy.is_group_catalogue() {
        value = first
            .attribute(HEADER, "NumFilesPerSnapshot")
            .ok()
            .flatten();
    }
    let value = value.ok_or_else(|| StoreError::MissingAttribute {
        group: group.to_owned(),
        name: attr.to_owned(),
    })?;
    match value.as_i64() {
        Some(n) if n >= 1 => Ok(n as usize),
        _ => Err(SnapshotError::Format {
            reason: format!("shard count {group}/{attr} = {value} is not a positive integer"),
        }),
    }
}

fn declared_count(
    shard: &dyn ShardHandle,
    hierarchy: &Hierarchy,
    on_disk: &str,
) -> Result<usize, SnapshotError> {
    match hierarchy {
        Hierarchy::Particles => {
            if !shard.is_group(on_disk) {
                return Ok(0);
            }
            let info = shard.dataset_info(&join_path(on_disk, REFERENCE_DATASET))?;
            Ok(info.rows())
        }
        Hierarchy::GroupCatalogue { root } => {
            let table = shard
                .attribute(root, "Number_per_Type")?
                .ok_or_else(|| StoreError::MissingAttribute {
                    group: root.clone(),
                    name: "Number_per_Type".to_owned(),
                })?;
            let idx = type_index(on_disk)?;
            match table.index_i64(idx) {
                Some(n) if n >= 0 => Ok(n as usize),
                _ => Err(SnapshotError::Format {
                    reason: format!(
                        "{root}/Number_per_Type has no valid entry {idx} for '{on_disk}' in {}",
                        shard.path().display()
                    ),
                }),
            }
        }
    }
}

/// Per-type, per-shard particle counts, taken from header metadata.
///
/// These are the declared counts: family slices are sized from them and
/// the loader compares dataset row counts against them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParticleCounts {
    counts: IndexMap<String, Vec<usize>>,
}

impl ParticleCounts {
    /// Count of `on_disk` particles in shard `shard` (0 if unknown).
    pub fn get(&self, on_disk: &str, shard: ShardId) -> usize {
        self.counts
            .get(on_disk)
            .and_then(|v| v.get(shard.0 as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Count of `on_disk` particles summed over every shard.
    pub fn total(&self, on_disk: &str) -> usize {
        self.counts
            .get(on_disk)
            .map(|v| v.iter().sum())
            .unwrap_or(0)
    }

    /// Per-shard counts of `on_disk`.
    pub fn per_shard(&self, on_disk: &str) -> Option<&[usize]> {
        self.counts.get(on_disk).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbsnap_core::{ArrayData, MetaValue};
    use nbsnap_store::{MemDataset, MemFile, MemStore};

    fn particle_file(n_files: i64, gas: usize) -> MemFile {
        let mut f = MemFile::new();
        f.set_attr(HEADER, "NumFilesPerSnapshot", n_files);
        f.insert_dataset(
            "PartType0/Coordinates",
            MemDataset::rows(ArrayData::F32(vec![0.0; gas * 3]), 3).unwrap(),
        );
        f
    }

    #[test]
    fn single_container_is_one_shard() {
        let mut store = MemStore::new();
        store.insert("snap", particle_file(4, 2));
        let set = ShardSet::open(&store, Path::new("snap"), "hdf5", &Hierarchy::Particles).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn sharded_sequence_uses_header_count() {
        let mut store = MemStore::new();
        for i in 0..3 {
            store.insert(format!("snap.{i}.hdf5"), particle_file(3, i + 1));
        }
        let set = ShardSet::open(&store, Path::new("snap"), "hdf5", &Hierarchy::Particles).unwrap();
        assert_eq!(set.len(), 3);
        let counts = set
            .particle_counts(&Hierarchy::Particles, ["PartType0", "PartType1"])
            .unwrap();
        assert_eq!(counts.per_shard("PartType0").unwrap(), [1, 2, 3]);
        assert_eq!(counts.total("PartType0"), 6);
        assert_eq!(counts.total("PartType1"), 0);
        assert_eq!(store.total_open_handles(), 3);
        drop(set);
        assert_eq!(store.total_open_handles(), 0);
    }

    #[test]
    fn missing_shard_fails() {
        let mut store = MemStore::new();
        store.insert("snap.0.hdf5", particle_file(2, 1));
        let err = ShardSet::open(&store, Path::new("snap"), "hdf5", &Hierarchy::Particles)
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Store(StoreError::NotAContainer { .. })
        ));
    }

    #[test]
    fn neither_form_is_no_container() {
        let store = MemStore::new();
        let err = ShardSet::open(&store, Path::new("snap"), "hdf5", &Hierarchy::Particles)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::NoContainer { .. }));
    }

    #[test]
    fn bad_shard_count_is_format_error() {
        let mut store = MemStore::new();
        store.insert("snap.0.hdf5", particle_file(0, 1));
        let err = ShardSet::open(&store, Path::new("snap"), "hdf5", &Hierarchy::Particles)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Format { .. }));
    }

    #[test]
    fn group_catalogue_counts_from_attribute() {
        let mut f = MemFile::new();
        f.set_attr("FOF", "NTask", 1i64)
            .set_attr("FOF", "Number_per_Type", MetaValue::IntArray(vec![5, 7]))
            .add_group("FOF/PartType1");
        let mut store = MemStore::new();
        store.insert("fof.0.hdf5", f);
        let hierarchy = Hierarchy::group_catalogue();
        let set = ShardSet::open(&store, Path::new("fof"), "hdf5", &hierarchy).unwrap();
        let counts = set.particle_counts(&hierarchy, ["PartType1"]).unwrap();
        assert_eq!(counts.get("PartType1", ShardId(0)), 7);
        assert!(set.particle_counts(&hierarchy, ["PartType4"]).is_err());
    }

    #[test]
    fn shard_path_appends_ordinal_and_extension() {
        assert_eq!(
            shard_path(Path::new("/data/snap_010"), 2, "hdf5"),
            PathBuf::from("/data/snap_010.2.hdf5")
        );
    }
}
