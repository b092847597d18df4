//! Lazy materialisation of per-particle arrays from the shard set.
//!
//! A load runs in two phases. Planning resolves, for every contributing
//! `(family, on-disk type, shard)` triple, where its rows come from (a
//! real dataset or a table-mass constant) and how wide each row is.
//! Every availability and shape check happens there, before the output
//! buffer exists. Filling then reads each source in order and copies it
//! into the next contiguous row range of the buffer.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use nbsnap_core::store::join_path;
use nbsnap_core::{
    ArrayData, Dtype, Family, ParticleArray, ShardHandle, ShardId, SnapshotError, StoreError,
};

use crate::config::{FormatConfig, Hierarchy, ShapePolicy};
use crate::family_index::FamilyIndex;
use crate::names::NameTranslator;
use crate::shards::{ParticleCounts, ShardSet, HEADER};
use crate::types::{type_index, TypeMap, TypeMapper};

/// Canonical name that is always considered available, since a format
/// may store a uniform per-type mass in the header instead of a
/// per-particle dataset.
pub const MASS: &str = "mass";

/// Header attribute holding the per-type table mass.
pub const MASS_TABLE: &str = "MassTable";

// ── Layout ─────────────────────────────────────────────────────────

/// The immutable particle layout of one snapshot: effective type map,
/// family slices and declared per-shard counts.
///
/// Shared between the snapshot and any [`SnapshotHandle`](crate::SnapshotHandle)
/// derived from it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    types: TypeMap,
    index: FamilyIndex,
    counts: ParticleCounts,
}

impl Layout {
    /// Assemble a layout, laying out family slices from `counts`.
    pub fn new(types: TypeMap, counts: ParticleCounts) -> Self {
        let index = FamilyIndex::build(&types, &counts);
        Self {
            types,
            index,
            counts,
        }
    }

    /// Effective family → on-disk type mapping.
    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    /// Family slices of the global index space.
    pub fn index(&self) -> &FamilyIndex {
        &self.index
    }

    /// Declared per-type, per-shard counts.
    pub fn counts(&self) -> &ParticleCounts {
        &self.counts
    }
}

// ── ShapeWarning ───────────────────────────────────────────────────

/// Record of a dataset whose row count disagreed with its type's
/// declared particle count, so that its per-particle width was inferred
/// as `elements / declared`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeWarning {
    /// Canonical array name being loaded.
    pub name: String,
    /// Family the dataset contributed to.
    pub family: Family,
    /// Shard holding the dataset.
    pub shard: ShardId,
    /// On-disk type of the dataset.
    pub on_disk_type: String,
    /// First-axis length found on disk.
    pub rows: usize,
    /// Particle count declared in the header.
    pub declared: usize,
    /// Inferred values per particle.
    pub inferred_dims: usize,
}

impl fmt::Display for ShapeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' for {}/{} in shard {} has {} rows but {} particles; reshaped to width {}",
            self.name,
            self.family,
            self.on_disk_type,
            self.shard,
            self.rows,
            self.declared,
            self.inferred_dims
        )
    }
}

/// A freshly materialised array plus any shape warnings raised for it.
#[derive(Clone, Debug, PartialEq)]
pub struct Loaded {
    /// The filled array.
    pub array: ParticleArray,
    /// Heuristic reshapes applied while planning.
    pub warnings: Vec<ShapeWarning>,
}

// ── Planning ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Source {
    Dataset { path: String },
    TableMass { value: f64 },
}

/// One `(family, on-disk type, shard)` triple being planned.
struct Target<'a> {
    name: &'a str,
    scope: Option<&'a Family>,
    family: &'a Family,
    on_disk: &'a str,
    shard_id: ShardId,
    count: usize,
}

#[derive(Clone, Debug)]
struct Piece {
    shard: ShardId,
    count: usize,
    source: Source,
    dtype: Dtype,
    dims: usize,
}

// ── LazyArrayLoader ────────────────────────────────────────────────

/// Reads canonical arrays on demand from every contributing shard.
pub struct LazyArrayLoader {
    shards: ShardSet,
    layout: Arc<Layout>,
    type_keys: IndexMap<String, BTreeSet<String>>,
    names: NameTranslator,
    hierarchy: Hierarchy,
    policy: ShapePolicy,
}

impl fmt::Debug for LazyArrayLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyArrayLoader")
            .field("shards", &self.shards)
            .field("layout", &self.layout)
            .field("hierarchy", &self.hierarchy)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl LazyArrayLoader {
    /// Resolve the layout of `shards` and prepare for loading.
    ///
    /// Reads only header metadata and group listings from the first
    /// shard, plus each shard's per-type counts. No particle data is read.
    pub fn new(
        shards: ShardSet,
        config: &FormatConfig,
        hierarchy: Hierarchy,
        policy: ShapePolicy,
    ) -> Result<Self, SnapshotError> {
        let root = hierarchy.root();
        let present = shards.first().keys(root)?;
        let types = TypeMapper::new(config.families()).resolve(&present);
        let counts = shards.particle_counts(&hierarchy, types.all_types())?;

        let mut type_keys = IndexMap::new();
        for on_disk in types.all_types() {
            let keys: BTreeSet<String> = shards
                .first()
                .walk_datasets(&join_path(root, on_disk))?
                .into_iter()
                .collect();
            type_keys.insert(on_disk.to_owned(), keys);
        }

        let layout = Layout::new(types, counts);
        debug!(
            path = %shards.base().display(),
            families = layout.types().len(),
            particles = layout.index().total(),
            "resolved snapshot layout"
        );
        Ok(Self {
            shards,
            layout: Arc::new(layout),
            type_keys,
            names: config.names().clone(),
            hierarchy,
            policy,
        })
    }

    /// The snapshot's particle layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub(crate) fn shared_layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// The opened shards.
    pub fn shards(&self) -> &ShardSet {
        &self.shards
    }

    /// The name translator in use.
    pub fn names(&self) -> &NameTranslator {
        &self.names
    }

    /// The sub-hierarchy holding the type groups.
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Union of canonical names found under any present type, sorted.
    ///
    /// Advisory only: a name listed here may still be missing for some
    /// family. [`is_available`](Self::is_available) is authoritative.
    pub fn loadable_keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for on_disk in self.type_keys.values().flatten() {
            keys.insert(self.names.to_canonical(on_disk).to_owned());
        }
        keys.into_iter().collect()
    }

    /// Whether `name` can be loaded for `family` (or for every family
    /// when `family` is `None`).
    ///
    /// Every on-disk type mapped to the target families must expose the
    /// translated name. [`MASS`] is always available.
    pub fn is_available(&self, name: &str, family: Option<&Family>) -> bool {
        if name == MASS {
            return true;
        }
        let on_disk = self.names.to_on_disk(name);
        self.target_families(family)
            .into_iter()
            .flat_map(|f| self.layout.types().types(f).unwrap_or_default())
            .all(|t| {
                self.type_keys
                    .get(t)
                    .is_some_and(|keys| keys.contains(on_disk))
            })
    }

    /// Materialise `name` for `family`, or for the whole snapshot when
    /// `family` is `None`.
    ///
    /// Fails with [`SnapshotError::UnknownFamily`] or
    /// [`SnapshotError::NotFound`] before anything is allocated.
    pub fn load(&self, name: &str, family: Option<&Family>) -> Result<Loaded, SnapshotError> {
        if let Some(f) = family {
            if !self.layout.types().contains(f) {
                return Err(SnapshotError::UnknownFamily { family: f.clone() });
            }
        }
        if !self.is_available(name, family) {
            return Err(not_found(name, family));
        }

        let (plan, warnings) = self.plan(name, family)?;
        let reference = plan
            .iter()
            .find(|(_, _, p)| p.count > 0)
            .or_else(|| plan.first())
            .map(|(_, _, p)| (p.dtype, p.dims))
            .unwrap_or((Dtype::F64, 1));
        let (dtype, dims) = reference;
        for (fam, on_disk, piece) in &plan {
            if piece.count > 0 && piece.dims != dims {
                return Err(SnapshotError::Format {
                    reason: format!(
                        "'{name}' has width {} for {fam}/{on_disk} in shard {} but width {dims} elsewhere",
                        piece.dims, piece.shard
                    ),
                });
            }
        }

        let rows: usize = self
            .target_families(family)
            .into_iter()
            .filter_map(|f| self.layout.index().slice(f))
            .map(|s| s.len())
            .sum();
        debug!(name, family = ?family.map(Family::name), rows, dims, "loading array");

        let mut array = ParticleArray::zeros(dtype, rows, dims)?;
        let mut offset = 0;
        for (_, _, piece) in plan.iter().filter(|(_, _, p)| p.count > 0) {
            let data = self.read_piece(piece)?;
            if data.len() != piece.count * dims {
                return Err(SnapshotError::Format {
                    reason: format!(
                        "'{name}' in shard {} has {} elements, expected {}",
                        piece.shard,
                        data.len(),
                        piece.count * dims
                    ),
                });
            }
            array.write_rows(offset, &data)?;
            offset += piece.count;
        }
        if offset != rows {
            return Err(SnapshotError::Format {
                reason: format!("'{name}' filled {offset} rows of {rows}"),
            });
        }
        Ok(Loaded { array, warnings })
    }

    fn target_families<'a>(&'a self, family: Option<&'a Family>) -> Vec<&'a Family> {
        match family {
            Some(f) => vec![f],
            None => self.layout.types().families().collect(),
        }
    }

    /// Resolve every contributing triple, in fill order.
    #[allow(clippy::type_complexity)]
    fn plan<'a>(
        &'a self,
        name: &str,
        family: Option<&'a Family>,
    ) -> Result<(Vec<(&'a Family, &'a str, Piece)>, Vec<ShapeWarning>), SnapshotError> {
        let mut plan = Vec::new();
        let mut warnings = Vec::new();
        for fam in self.target_families(family) {
            let types = self.layout.types().types(fam).unwrap_or_default();
            for on_disk in types {
                for (shard_id, shard) in self.shards.iter() {
                    let target = Target {
                        name,
                        scope: family,
                        family: fam,
                        on_disk,
                        shard_id,
                        count: self.layout.counts().get(on_disk, shard_id),
                    };
                    if let Some(piece) = self.plan_piece(shard, &target, &mut warnings)? {
                        plan.push((fam, on_disk.as_str(), piece));
                    }
                }
            }
        }
        Ok((plan, warnings))
    }

    fn plan_piece(
        &self,
        shard: &dyn ShardHandle,
        t: &Target<'_>,
        warnings: &mut Vec<ShapeWarning>,
    ) -> Result<Option<Piece>, SnapshotError> {
        if t.name == MASS {
            if let Some(value) = table_mass(shard, t.on_disk)? {
                return Ok(Some(Piece {
                    shard: t.shard_id,
                    count: t.count,
                    source: Source::TableMass { value },
                    dtype: Dtype::F64,
                    dims: 1,
                }));
            }
        }

        let on_disk_name = self.names.to_on_disk(t.name);
        let path = join_path(&join_path(self.hierarchy.root(), t.on_disk), on_disk_name);
        let info = match shard.dataset_info(&path) {
            Ok(info) => info,
            // A type absent from this shard contributes nothing.
            Err(StoreError::MissingDataset { .. }) if t.count == 0 => return Ok(None),
            Err(StoreError::MissingDataset { .. }) => return Err(not_found(t.name, t.scope)),
            Err(e) => return Err(e.into()),
        };

        let dims = if t.count == 0 || info.rows() == t.count {
            info.width()
        } else {
            self.infer_dims(t, info.rows(), info.element_count(), warnings)?
        };
        if dims == 0 {
            // An empty piece of zero width carries nothing to fill.
            if t.count == 0 {
                return Ok(None);
            }
            return Err(SnapshotError::Format {
                reason: format!(
                    "'{}' for {}/{} in shard {} has zero width but {} particles",
                    t.name, t.family, t.on_disk, t.shard_id, t.count
                ),
            });
        }
        Ok(Some(Piece {
            shard: t.shard_id,
            count: t.count,
            source: Source::Dataset { path },
            dtype: info.dtype,
            dims,
        }))
    }

    /// Width of a dataset whose row count disagrees with its declared
    /// particle count, treating it as a flattened fixed-width array.
    fn infer_dims(
        &self,
        t: &Target<'_>,
        rows: usize,
        elements: usize,
        warnings: &mut Vec<ShapeWarning>,
    ) -> Result<usize, SnapshotError> {
        if self.policy == ShapePolicy::Strict || elements == 0 || elements % t.count != 0 {
            return Err(SnapshotError::Format {
                reason: format!(
                    "'{}' for {}/{} in shard {} has {rows} rows ({elements} elements) but {} particles",
                    t.name, t.family, t.on_disk, t.shard_id, t.count
                ),
            });
        }
        let dims = elements / t.count;
        warn!(
            name = t.name,
            family = %t.family,
            shard = %t.shard_id,
            rows,
            declared = t.count,
            dims,
            "row count disagrees with header; reshaping as flattened array"
        );
        warnings.push(ShapeWarning {
            name: t.name.to_owned(),
            family: t.family.clone(),
            shard: t.shard_id,
            on_disk_type: t.on_disk.to_owned(),
            rows,
            declared: t.count,
            inferred_dims: dims,
        });
        Ok(dims)
    }

    fn read_piece(&self, piece: &Piece) -> Result<ArrayData, SnapshotError> {
        match &piece.source {
            Source::TableMass { value } => Ok(ArrayData::F64(vec![*value; piece.count])),
            Source::Dataset { path } => {
                let shard = self
                    .shards
                    .get(piece.shard)
                    .ok_or_else(|| SnapshotError::Format {
                        reason: format!("shard {} vanished", piece.shard),
                    })?;
                Ok(shard.read_dataset(path)?)
            }
        }
    }
}

fn not_found(name: &str, family: Option<&Family>) -> SnapshotError {
    SnapshotError::NotFound {
        name: name.to_owned(),
        family: family.cloned(),
    }
}

/// Nonzero table mass of `on_disk` in this shard's header, if any.
fn table_mass(shard: &dyn ShardHandle, on_disk: &str) -> Result<Option<f64>, SnapshotError> {
    let table = match shard.attribute(HEADER, MASS_TABLE) {
        Ok(Some(table)) => table,
        Ok(None) | Err(StoreError::MissingGroup { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mass = table.index_f64(type_index(on_disk)?).unwrap_or(0.0);
    Ok((mass > 0.0).then_some(mass))
}
