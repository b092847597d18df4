//! The logical snapshot: one particle index space over many shards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::debug;

use nbsnap_core::{Family, FamilySlice, ParticleArray, ShardStore, SnapshotError, SnapshotId};

use crate::config::{
    FormatConfig, FormatRegistry, Hierarchy, SnapshotOptions, GADGET_HDF, SUBFIND_HDF,
};
use crate::family_index::FamilyIndex;
use crate::loader::{LazyArrayLoader, Layout, ShapeWarning};
use crate::properties::{FileUnits, Properties};
use crate::shards::{ParticleCounts, ShardSet};
use crate::types::TypeMap;

/// Cache key: canonical name plus family scope (`None` = whole snapshot).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ArrayKey {
    name: String,
    family: Option<Family>,
}

impl ArrayKey {
    fn new(name: &str, family: Option<&Family>) -> Self {
        Self {
            name: name.to_owned(),
            family: family.cloned(),
        }
    }
}

/// A multi-shard particle snapshot with lazily loaded arrays.
///
/// Construction opens every shard and reads only header metadata.
/// Arrays are read on first [`load`](Self::load) and cached for the
/// snapshot's lifetime. Dropping (or [`release`](Self::release)-ing) the
/// snapshot closes every shard at once and invalidates every
/// [`SnapshotHandle`] derived from it.
pub struct Snapshot {
    id: SnapshotId,
    path: PathBuf,
    loader: LazyArrayLoader,
    layout: Arc<Layout>,
    alive: Arc<AtomicBool>,
    cache: IndexMap<ArrayKey, ParticleArray>,
    warnings: Vec<ShapeWarning>,
    properties: Properties,
    units: Option<FileUnits>,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("shards", &self.loader.shards().len())
            .field("particles", &self.num_particles())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Snapshot {
    /// Open the snapshot at `path` with explicit format tables.
    ///
    /// `path` is either a single container or the base of a sharded
    /// sequence `path.0.<ext>`, `path.1.<ext>`, ... Initializers from
    /// `options` run in order once the layout is resolved.
    pub fn open(
        store: &dyn ShardStore,
        path: impl AsRef<Path>,
        config: &FormatConfig,
        options: SnapshotOptions,
    ) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let SnapshotOptions {
            extension,
            hierarchy,
            shape_policy,
            initializers,
        } = options;
        let shards = ShardSet::open(store, path, &extension, &hierarchy)?;
        let loader = LazyArrayLoader::new(shards, config, hierarchy, shape_policy)?;
        let layout = Arc::clone(loader.shared_layout());
        let mut snap = Self {
            id: SnapshotId::next(),
            path: path.to_path_buf(),
            loader,
            layout,
            alive: Arc::new(AtomicBool::new(true)),
            cache: IndexMap::new(),
            warnings: Vec::new(),
            properties: Properties::new(),
            units: None,
        };
        for init in initializers {
            init(&mut snap)?;
        }
        debug!(id = %snap.id, path = %path.display(), "opened snapshot");
        Ok(snap)
    }

    /// Open with the tables registered under `format` in the global
    /// [`FormatRegistry`].
    pub fn open_format(
        store: &dyn ShardStore,
        path: impl AsRef<Path>,
        format: &str,
        options: SnapshotOptions,
    ) -> Result<Self, SnapshotError> {
        let config = FormatRegistry::global()
            .get(format)
            .map_err(|e| SnapshotError::Format {
                reason: e.to_string(),
            })?;
        Self::open(store, path, config, options)
    }

    /// Open an ordinary Gadget-style HDF5 snapshot with default options.
    pub fn open_gadget(
        store: &dyn ShardStore,
        path: impl AsRef<Path>,
    ) -> Result<Self, SnapshotError> {
        Self::open_format(store, path, GADGET_HDF, SnapshotOptions::default())
    }

    /// Open a SubFind group catalogue (types under `FOF`) with default
    /// options.
    pub fn open_subfind(
        store: &dyn ShardStore,
        path: impl AsRef<Path>,
    ) -> Result<Self, SnapshotError> {
        Self::open_format(store, path, SUBFIND_HDF, SnapshotOptions::group_catalogue())
    }

    // ── Identity and layout ────────────────────────────────────────

    /// Process-unique id of this snapshot.
    pub fn id(&self) -> SnapshotId {
        self.id
    }

    /// Base path the snapshot was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The opened shards.
    pub fn shards(&self) -> &ShardSet {
        self.loader.shards()
    }

    /// Where the type groups live.
    pub fn hierarchy(&self) -> &Hierarchy {
        self.loader.hierarchy()
    }

    /// Effective family → on-disk type mapping.
    pub fn type_map(&self) -> &TypeMap {
        self.layout.types()
    }

    /// Family slices of the global index space.
    pub fn family_index(&self) -> &FamilyIndex {
        self.layout.index()
    }

    /// Declared per-type, per-shard particle counts.
    pub fn counts(&self) -> &ParticleCounts {
        self.layout.counts()
    }

    /// Total particle count.
    pub fn num_particles(&self) -> usize {
        self.layout.index().total()
    }

    /// Present families, in layout order.
    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.layout.index().families()
    }

    /// Slice of `family` in the global index space.
    pub fn family_slice(&self, family: &Family) -> Option<FamilySlice> {
        self.layout.index().slice(family)
    }

    /// Particle count of `family` (0 if absent).
    pub fn family_len(&self, family: &Family) -> usize {
        self.family_slice(family).map_or(0, |s| s.len())
    }

    /// A non-owning handle that observes this snapshot's lifetime.
    pub fn handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            id: self.id,
            layout: Arc::downgrade(&self.layout),
            alive: Arc::clone(&self.alive),
        }
    }

    // ── Arrays ─────────────────────────────────────────────────────

    /// Canonical names present under any type. Advisory; see
    /// [`is_loadable`](Self::is_loadable).
    pub fn loadable_keys(&self) -> Vec<String> {
        self.loader.loadable_keys()
    }

    /// Whether `name` can be loaded for `family` (all families if `None`).
    pub fn is_loadable(&self, name: &str, family: Option<&Family>) -> bool {
        self.loader.is_available(name, family)
    }

    /// The array `name` for `family` (whole snapshot if `None`), reading
    /// it from disk on first access.
    ///
    /// A failed load leaves nothing cached.
    pub fn load(
        &mut self,
        name: &str,
        family: Option<&Family>,
    ) -> Result<&ParticleArray, SnapshotError> {
        self.load_mut(name, family).map(|a| &*a)
    }

    /// Like [`load`](Self::load) but returns the cached buffer mutably.
    /// Edits stay in memory and never trigger a re-read.
    pub fn load_mut(
        &mut self,
        name: &str,
        family: Option<&Family>,
    ) -> Result<&mut ParticleArray, SnapshotError> {
        match self.cache.entry(ArrayKey::new(name, family)) {
            Entry::Occupied(e) => {
                debug!(name, family = ?family.map(Family::name), "array cache hit");
                Ok(e.into_mut())
            }
            Entry::Vacant(e) => {
                let loaded = self.loader.load(name, family)?;
                self.warnings.extend(loaded.warnings);
                Ok(e.insert(loaded.array))
            }
        }
    }

    /// Whether `name` for `family` is already cached.
    pub fn is_loaded(&self, name: &str, family: Option<&Family>) -> bool {
        self.cache.contains_key(&ArrayKey::new(name, family))
    }

    /// The cached array, without touching disk.
    pub fn get(&self, name: &str, family: Option<&Family>) -> Option<&ParticleArray> {
        self.cache.get(&ArrayKey::new(name, family))
    }

    /// The cached array, mutably, without touching disk.
    pub fn get_mut(&mut self, name: &str, family: Option<&Family>) -> Option<&mut ParticleArray> {
        self.cache.get_mut(&ArrayKey::new(name, family))
    }

    /// Drop the cached array, returning it. The next load re-reads.
    pub fn evict(&mut self, name: &str, family: Option<&Family>) -> Option<ParticleArray> {
        self.cache.shift_remove(&ArrayKey::new(name, family))
    }

    /// Every heuristic reshape applied so far, in load order.
    pub fn shape_warnings(&self) -> &[ShapeWarning] {
        &self.warnings
    }

    // ── Metadata ───────────────────────────────────────────────────

    /// Snapshot properties.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Mutable snapshot properties.
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// File units, once the units initializer has run.
    pub fn units(&self) -> Option<&FileUnits> {
        self.units.as_ref()
    }

    /// Replace the file units.
    pub fn set_units(&mut self, units: FileUnits) {
        self.units = Some(units);
    }

    /// Close every shard and invalidate every handle.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        debug!(id = %self.id, shards = self.loader.shards().len(), "releasing snapshot");
    }
}

/// Non-owning reference to a [`Snapshot`]'s layout.
///
/// Holds no shard open and does not keep the snapshot alive. Liveness
/// is a flag only the snapshot can clear, so a layout obtained through
/// [`upgrade`](Self::upgrade) and held past the snapshot's release does
/// not revive the handle.
#[derive(Clone, Debug)]
pub struct SnapshotHandle {
    id: SnapshotId,
    layout: Weak<Layout>,
    alive: Arc<AtomicBool>,
}

impl SnapshotHandle {
    /// Id of the snapshot this handle was taken from.
    pub fn id(&self) -> SnapshotId {
        self.id
    }

    /// Whether the snapshot is still alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// The snapshot's layout, or `None` once the snapshot is gone.
    pub fn upgrade(&self) -> Option<Arc<Layout>> {
        if !self.is_alive() {
            return None;
        }
        self.layout.upgrade()
    }
}
