//! Synthetic shard sets for snapshot and halo tests.
//!
//! - [`SnapshotBuilder`]: an ordinary particle snapshot over N shards.
//! - [`CatalogueBuilder`]: a group catalogue with per-type offset and
//!   length tables under `FOF`.
//!
//! Every dataset written is also recorded on the returned fixture, so a
//! test can compute the array it expects a load to produce.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use nbsnap_core::{ArrayData, MetaValue};
use nbsnap_store::{MemDataset, MemFile, MemStore};

/// Number of entries in per-type header tables.
pub const NUM_TYPES: usize = 6;

fn type_index(on_disk: &str) -> usize {
    on_disk
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .unwrap_or_else(|_| panic!("fixture type '{on_disk}' has no numeric suffix"))
}

fn shard_path(base: &str, shard: usize, shards: usize, single_file: bool) -> PathBuf {
    if single_file && shards == 1 {
        PathBuf::from(base)
    } else {
        PathBuf::from(format!("{base}.{shard}.hdf5"))
    }
}

fn random_f32(rng: &mut ChaCha8Rng, len: usize) -> Vec<f32> {
    (0..len)
        .map(|_| (rng.next_u32() >> 8) as f32 / (1u32 << 24) as f32)
        .collect()
}

/// Datasets recorded per `(on-disk type, shard, field)`.
type Written = IndexMap<(String, usize, String), ArrayData>;

fn expected_concat(written: &Written, shards: usize, types: &[&str], field: &str) -> Vec<f64> {
    let mut out = Vec::new();
    for t in types {
        for s in 0..shards {
            if let Some(data) = written.get(&((*t).to_owned(), s, field.to_owned())) {
                out.extend(data.to_f64_vec());
            }
        }
    }
    out
}

// ── SnapshotBuilder ────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct ExtraField {
    on_disk_type: String,
    name: String,
    width: usize,
    flattened: bool,
}

/// Builds an ordinary multi-shard particle snapshot in a [`MemStore`].
///
/// Each listed type gets `Coordinates` and `Velocities` (3-wide `f32`),
/// `ParticleIDs` (`u64`, numbered in fill order) and, unless a table
/// mass is set, `Mass` (`f32`). The header carries `NumFilesPerSnapshot`,
/// `MassTable`, `ExpansionFactor = 0.5`, `HubbleParam = 0.7`,
/// `Omega0 = 0.3`, `OmegaLambda = 0.7` and `BoxSize = 100`.
#[derive(Clone, Debug)]
pub struct SnapshotBuilder {
    base: String,
    shards: usize,
    counts: IndexMap<String, Vec<usize>>,
    mass_table: [f64; NUM_TYPES],
    extra: Vec<ExtraField>,
    header: Vec<(String, MetaValue)>,
    units: bool,
    comoving: Option<bool>,
    single_file: bool,
    seed: u64,
}

impl SnapshotBuilder {
    /// A snapshot rooted at `base` with `shards` shards and no types.
    pub fn new(base: &str, shards: usize) -> Self {
        Self {
            base: base.to_owned(),
            shards,
            counts: IndexMap::new(),
            mass_table: [0.0; NUM_TYPES],
            extra: Vec::new(),
            header: vec![
                ("ExpansionFactor".into(), MetaValue::Float(0.5)),
                ("HubbleParam".into(), MetaValue::Float(0.7)),
                ("Omega0".into(), MetaValue::Float(0.3)),
                ("OmegaLambda".into(), MetaValue::Float(0.7)),
                ("BoxSize".into(), MetaValue::Float(100.0)),
            ],
            units: true,
            comoving: None,
            single_file: false,
            seed: 42,
        }
    }

    /// Add `on_disk_type` with the given per-shard counts.
    pub fn particles(mut self, on_disk_type: &str, per_shard: &[usize]) -> Self {
        assert_eq!(per_shard.len(), self.shards, "one count per shard");
        self.counts.insert(on_disk_type.to_owned(), per_shard.to_vec());
        self
    }

    /// Store a uniform table mass for `on_disk_type` instead of a
    /// per-particle `Mass` dataset.
    pub fn table_mass(mut self, on_disk_type: &str, mass: f64) -> Self {
        self.mass_table[type_index(on_disk_type)] = mass;
        self
    }

    /// Add a random `f32` field of `width` values per particle, stored as
    /// `n × width` (or `n` when `width` is 1).
    pub fn field(mut self, on_disk_type: &str, name: &str, width: usize) -> Self {
        self.extra.push(ExtraField {
            on_disk_type: on_disk_type.to_owned(),
            name: name.to_owned(),
            width,
            flattened: false,
        });
        self
    }

    /// Add a random `f32` field of `width` values per particle, stored as
    /// a flat one-dimensional dataset of `n * width` elements.
    pub fn flattened_field(mut self, on_disk_type: &str, name: &str, width: usize) -> Self {
        self.extra.push(ExtraField {
            on_disk_type: on_disk_type.to_owned(),
            name: name.to_owned(),
            width,
            flattened: true,
        });
        self
    }

    /// Set (or replace) a header attribute.
    pub fn header_attr(mut self, name: &str, value: impl Into<MetaValue>) -> Self {
        let value = value.into();
        match self.header.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.header.push((name.to_owned(), value)),
        }
        self
    }

    /// Remove a header attribute.
    pub fn without_header_attr(mut self, name: &str) -> Self {
        self.header.retain(|(n, _)| n != name);
        self
    }

    /// Whether to write a `Units` group (default: yes).
    pub fn units(mut self, units: bool) -> Self {
        self.units = units;
        self
    }

    /// Write `Parameters/NumericalParameters/ComovingIntegrationOn`.
    pub fn comoving(mut self, on: bool) -> Self {
        self.comoving = Some(on);
        self
    }

    /// With one shard, store it at `base` itself rather than `base.0.hdf5`.
    pub fn single_file(mut self) -> Self {
        self.single_file = true;
        self
    }

    /// RNG seed for field values.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Write every shard into a fresh store.
    pub fn build(self) -> Fixture {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut written = Written::new();
        let mut files: Vec<MemFile> = (0..self.shards).map(|_| MemFile::new()).collect();

        for (s, file) in files.iter_mut().enumerate() {
            file.add_group("Header");
            for (name, value) in &self.header {
                file.set_attr("Header", name, value.clone());
            }
            file.set_attr("Header", "NumFilesPerSnapshot", self.shards as i64)
                .set_attr("Header", "MassTable", self.mass_table.to_vec());
            let this_file: Vec<i64> = (0..NUM_TYPES)
                .map(|i| {
                    self.counts
                        .iter()
                        .find(|(t, _)| type_index(t) == i)
                        .map_or(0, |(_, c)| c[s] as i64)
                })
                .collect();
            file.set_attr("Header", "NumPart_ThisFile", this_file);
            if self.units {
                file.set_attr("Units", "UnitVelocity_in_cm_per_s", 1e5)
                    .set_attr("Units", "UnitLength_in_cm", 3.085_678e21)
                    .set_attr("Units", "UnitMass_in_g", 1.989e43);
            }
            if let Some(on) = self.comoving {
                file.set_attr(
                    "Parameters/NumericalParameters",
                    "ComovingIntegrationOn",
                    i64::from(on),
                );
            }
        }

        let mut next_id = 0u64;
        for (on_disk, per_shard) in &self.counts {
            for (s, &n) in per_shard.iter().enumerate() {
                let file = &mut files[s];
                let mut put = |name: &str, data: ArrayData, width: usize| {
                    let ds = if width == 1 {
                        MemDataset::flat(data.clone())
                    } else {
                        MemDataset::rows(data.clone(), width).expect("fixture dataset shape")
                    };
                    file.insert_dataset(&format!("{on_disk}/{name}"), ds);
                    written.insert((on_disk.clone(), s, name.to_owned()), data);
                };
                put("Coordinates", ArrayData::F32(random_f32(&mut rng, n * 3)), 3);
                put("Velocities", ArrayData::F32(random_f32(&mut rng, n * 3)), 3);
                put("ParticleIDs", ArrayData::U64((next_id..next_id + n as u64).collect()), 1);
                next_id += n as u64;
                if self.mass_table[type_index(on_disk)] == 0.0 {
                    put("Mass", ArrayData::F32(random_f32(&mut rng, n)), 1);
                }
                for extra in self.extra.iter().filter(|e| &e.on_disk_type == on_disk) {
                    let data = ArrayData::F32(random_f32(&mut rng, n * extra.width));
                    let width = if extra.flattened { 1 } else { extra.width };
                    put(&extra.name, data, width);
                }
            }
        }

        let mut store = MemStore::new();
        for (s, file) in files.into_iter().enumerate() {
            store.insert(shard_path(&self.base, s, self.shards, self.single_file), file);
        }
        Fixture {
            store,
            base: PathBuf::from(&self.base),
            shards: self.shards,
            written,
        }
    }
}

/// A built particle snapshot and a record of what was written.
#[derive(Debug)]
pub struct Fixture {
    store: MemStore,
    base: PathBuf,
    shards: usize,
    written: Written,
}

impl Fixture {
    /// The store holding every shard.
    pub fn store(&self) -> &MemStore {
        &self.store
    }

    /// Mutable store, for corrupting shards after the fact.
    pub fn store_mut(&mut self) -> &mut MemStore {
        &mut self.store
    }

    /// Base path to open.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The dataset written for `field` of `on_disk_type` in `shard`.
    pub fn written(&self, on_disk_type: &str, shard: usize, field: &str) -> Option<&ArrayData> {
        self.written
            .get(&(on_disk_type.to_owned(), shard, field.to_owned()))
    }

    /// Values of `field` concatenated over `types`, then shards: the
    /// order a load fills them in.
    pub fn expected(&self, types: &[&str], field: &str) -> Vec<f64> {
        expected_concat(&self.written, self.shards, types, field)
    }
}

// ── CatalogueBuilder ───────────────────────────────────────────────

/// Builds a SubFind-style group catalogue in a [`MemStore`].
///
/// Each shard holds some groups. For every listed type, group `g` owns
/// a random number (up to `max_len`) of that type's particles, numbered
/// contiguously in group order; the shard holding `g` stores them. Each
/// type group `FOF/<type>` carries `Coordinates`, `ParticleIDs`, and the
/// per-group `Offset` and `Length` tables for that shard's groups.
#[derive(Clone, Debug)]
pub struct CatalogueBuilder {
    base: String,
    groups_per_shard: Vec<usize>,
    types: Vec<String>,
    max_len: usize,
    ntask: bool,
    total_override: Option<i64>,
    seed: u64,
}

impl CatalogueBuilder {
    /// A catalogue at `base` with the given group counts per shard.
    pub fn new(base: &str, groups_per_shard: &[usize]) -> Self {
        Self {
            base: base.to_owned(),
            groups_per_shard: groups_per_shard.to_vec(),
            types: vec!["PartType0".into(), "PartType1".into()],
            max_len: 8,
            ntask: true,
            total_override: None,
            seed: 7,
        }
    }

    /// Replace the list of present types.
    pub fn types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|t| (*t).to_owned()).collect();
        self
    }

    /// Largest per-type group length.
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Omit `FOF/NTask`, leaving only `Header/NumFilesPerSnapshot`.
    pub fn without_ntask(mut self) -> Self {
        self.ntask = false;
        self
    }

    /// Write a wrong `Total_Number_of_groups`.
    pub fn total_groups(mut self, total: i64) -> Self {
        self.total_override = Some(total);
        self
    }

    /// RNG seed for group lengths and coordinates.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Write every shard into a fresh store.
    pub fn build(self) -> CatalogueFixture {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let shards = self.groups_per_shard.len();
        let total: usize = self.groups_per_shard.iter().sum();
        let span = self.max_len as u32 + 1;

        let mut lengths: IndexMap<String, Vec<i64>> = IndexMap::new();
        let mut offsets: IndexMap<String, Vec<i64>> = IndexMap::new();
        for t in &self.types {
            let lens: Vec<i64> = (0..total).map(|_| (rng.next_u32() % span) as i64).collect();
            let mut offs = Vec::with_capacity(total);
            let mut cursor = 0;
            for &l in &lens {
                offs.push(cursor);
                cursor += l;
            }
            lengths.insert(t.clone(), lens);
            offsets.insert(t.clone(), offs);
        }

        let total_attr = self.total_override.unwrap_or(total as i64);
        let mut written = Written::new();
        let mut store = MemStore::new();
        let mut first_group = 0;
        for (s, &groups) in self.groups_per_shard.iter().enumerate() {
            let range = first_group..first_group + groups;
            first_group += groups;

            let mut file = MemFile::new();
            file.set_attr("Header", "NumFilesPerSnapshot", shards as i64)
                .set_attr("Header", "HubbleParam", 0.7)
                .set_attr("FOF", "Total_Number_of_groups", total_attr)
                .set_attr("FOF", "Number_of_groups", groups as i64);
            if self.ntask {
                file.set_attr("FOF", "NTask", shards as i64);
            }

            let mut per_type = vec![0i64; NUM_TYPES];
            for t in &self.types {
                let lens = &lengths[t][range.clone()];
                let offs = &offsets[t][range.clone()];
                let n: i64 = lens.iter().sum();
                per_type[type_index(t)] = n;
                let n = n as usize;
                let first_particle = offs.first().copied().unwrap_or(0) as u64;

                let coords = ArrayData::F32(random_f32(&mut rng, n * 3));
                let ids = ArrayData::U64((first_particle..first_particle + n as u64).collect());
                let group = format!("FOF/{t}");
                file.add_group(&group)
                    .insert_dataset(
                        &format!("{group}/Coordinates"),
                        MemDataset::rows(coords.clone(), 3).expect("fixture dataset shape"),
                    )
                    .insert_dataset(&format!("{group}/ParticleIDs"), MemDataset::flat(ids.clone()))
                    .insert_dataset(
                        &format!("{group}/Offset"),
                        MemDataset::flat(ArrayData::I32(offs.iter().map(|&o| o as i32).collect())),
                    )
                    .insert_dataset(
                        &format!("{group}/Length"),
                        MemDataset::flat(ArrayData::I32(lens.iter().map(|&l| l as i32).collect())),
                    );
                written.insert((t.clone(), s, "Coordinates".into()), coords);
                written.insert((t.clone(), s, "ParticleIDs".into()), ids);
            }
            file.set_attr("FOF", "Number_per_Type", per_type);
            store.insert(format!("{}.{s}.hdf5", self.base), file);
        }

        CatalogueFixture {
            store,
            base: PathBuf::from(&self.base),
            shards,
            total_groups: total,
            offsets,
            lengths,
            written,
        }
    }
}

/// A built group catalogue and its generated tables.
#[derive(Debug)]
pub struct CatalogueFixture {
    store: MemStore,
    base: PathBuf,
    shards: usize,
    total_groups: usize,
    offsets: IndexMap<String, Vec<i64>>,
    lengths: IndexMap<String, Vec<i64>>,
    written: Written,
}

impl CatalogueFixture {
    /// The store holding every shard.
    pub fn store(&self) -> &MemStore {
        &self.store
    }

    /// Mutable store, for corrupting shards after the fact.
    pub fn store_mut(&mut self) -> &mut MemStore {
        &mut self.store
    }

    /// Base path to open.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Number of groups across every shard.
    pub fn total_groups(&self) -> usize {
        self.total_groups
    }

    /// Global per-group offsets of `on_disk_type`.
    pub fn offsets(&self, on_disk_type: &str) -> &[i64] {
        self.offsets.get(on_disk_type).map_or(&[][..], Vec::as_slice)
    }

    /// Global per-group lengths of `on_disk_type`.
    pub fn lengths(&self, on_disk_type: &str) -> &[i64] {
        self.lengths.get(on_disk_type).map_or(&[][..], Vec::as_slice)
    }

    /// Values of `field` concatenated over `types`, then shards.
    pub fn expected(&self, types: &[&str], field: &str) -> Vec<f64> {
        expected_concat(&self.written, self.shards, types, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_builder_is_deterministic() {
        let a = SnapshotBuilder::new("snap", 2)
            .particles("PartType0", &[3, 4])
            .build();
        let b = SnapshotBuilder::new("snap", 2)
            .particles("PartType0", &[3, 4])
            .build();
        assert_eq!(
            a.expected(&["PartType0"], "Coordinates"),
            b.expected(&["PartType0"], "Coordinates")
        );
        assert_eq!(a.store().len(), 2);
        assert_eq!(
            a.expected(&["PartType0"], "ParticleIDs"),
            (0..7).map(f64::from).collect::<Vec<_>>()
        );
    }

    #[test]
    fn catalogue_offsets_are_cumulative() {
        let fx = CatalogueBuilder::new("fof", &[2, 3]).build();
        assert_eq!(fx.total_groups(), 5);
        for t in ["PartType0", "PartType1"] {
            let offs = fx.offsets(t);
            let lens = fx.lengths(t);
            for g in 1..5 {
                assert_eq!(offs[g], offs[g - 1] + lens[g - 1]);
            }
        }
    }
}
