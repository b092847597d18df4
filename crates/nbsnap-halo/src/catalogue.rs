//! Friends-of-friends group catalogue over a group-catalogue snapshot.

use indexmap::IndexMap;
use tracing::debug;

use nbsnap_core::store::join_path;
use nbsnap_core::{Family, HaloError, HaloId, StoreError};
use nbsnap_snapshot::{Snapshot, SnapshotHandle};

use crate::halo::Halo;

/// Root attribute giving the number of groups over every shard.
pub const TOTAL_GROUPS: &str = "Total_Number_of_groups";

/// Per-type dataset of each group's first particle, relative to the type.
pub const OFFSET: &str = "Offset";

/// Per-type dataset of each group's particle count.
pub const LENGTH: &str = "Length";

/// Offset and length of every group for one family's representative type.
#[derive(Clone, Debug, PartialEq, Eq)]
struct GroupTable {
    on_disk: String,
    offsets: Vec<u64>,
    lengths: Vec<u64>,
}

/// Resolves group ids to the global particle indices they own.
///
/// Built once from a group-catalogue [`Snapshot`]: the per-shard
/// `Offset` and `Length` records of each family's first on-disk type are
/// concatenated in shard order. The catalogue keeps only a
/// [`SnapshotHandle`], so it never extends the snapshot's lifetime;
/// every resolution checks the snapshot is still alive first.
#[derive(Clone, Debug)]
pub struct HaloCatalogue {
    parent: SnapshotHandle,
    count: usize,
    tables: IndexMap<Family, GroupTable>,
}

impl HaloCatalogue {
    /// Read the group tables of `snap`.
    ///
    /// Fails with [`HaloError::Format`] unless `snap` uses a
    /// group-catalogue hierarchy, the offset tables total exactly the
    /// root's group count, and every group lies inside its family.
    pub fn new(snap: &Snapshot) -> Result<Self, HaloError> {
        if !snap.hierarchy().is_group_catalogue() {
            return Err(HaloError::Format {
                reason: format!("'{}' is not a group catalogue", snap.path().display()),
            });
        }
        let root = snap.hierarchy().root();
        let total = snap
            .shards()
            .first()
            .attribute(root, TOTAL_GROUPS)?
            .ok_or_else(|| StoreError::MissingAttribute {
                group: root.to_owned(),
                name: TOTAL_GROUPS.to_owned(),
            })?;
        let count = match total.as_i64() {
            Some(n) if n >= 0 => n as usize,
            _ => {
                return Err(HaloError::Format {
                    reason: format!("{root}/{TOTAL_GROUPS} = {total} is not a group count"),
                })
            }
        };

        let mut tables = IndexMap::new();
        for (family, types) in snap.type_map().iter() {
            let Some(on_disk) = types.first() else {
                continue;
            };
            let table = read_table(snap, root, on_disk)?;
            if table.offsets.len() != count {
                return Err(HaloError::Format {
                    reason: format!(
                        "{on_disk} lists {} groups but {root}/{TOTAL_GROUPS} is {count}",
                        table.offsets.len()
                    ),
                });
            }
            let family_len = snap.family_len(family) as u64;
            let overruns = |g: &usize| table.offsets[*g] + table.lengths[*g] > family_len;
            if let Some(g) = (0..count).find(overruns) {
                return Err(HaloError::Format {
                    reason: format!(
                        "group {g} spans {}..{} of {on_disk}, beyond {family_len} particles",
                        table.offsets[g],
                        table.offsets[g] + table.lengths[g]
                    ),
                });
            }
            tables.insert(family.clone(), table);
        }
        debug!(
            snapshot = %snap.id(),
            groups = count,
            families = tables.len(),
            "built halo catalogue"
        );
        Ok(Self {
            parent: snap.handle(),
            count,
            tables,
        })
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the catalogue has no groups.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Handle to the parent snapshot.
    pub fn parent(&self) -> &SnapshotHandle {
        &self.parent
    }

    /// Particle indices of group `id`.
    ///
    /// For each family, in layout order, the group's run of that
    /// family's particles is `start + offset .. start + offset + length`
    /// where `start` is the family slice start.
    pub fn resolve(&self, id: HaloId) -> Result<Halo, HaloError> {
        let layout = self.parent.upgrade().ok_or(HaloError::ParentReleased)?;
        if id.0 >= self.count as u64 {
            return Err(HaloError::OutOfRange {
                id: id.0,
                count: self.count as u64,
            });
        }
        let g = id.0 as usize;
        let total: u64 = self.tables.values().map(|t| t.lengths[g]).sum();
        let mut particles = Vec::with_capacity(total as usize);
        for (family, table) in &self.tables {
            let slice = layout
                .index()
                .slice(family)
                .ok_or_else(|| HaloError::Format {
                    reason: format!("family '{family}' vanished from the layout"),
                })?;
            let start = slice.start + table.offsets[g] as usize;
            particles.extend(start..start + table.lengths[g] as usize);
        }
        Ok(Halo::new(id, self.parent.id(), particles))
    }

    /// Every group in id order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Halo, HaloError>> + '_ {
        (0..self.count as u64).map(move |i| self.resolve(HaloId(i)))
    }

    /// Per-group offsets of `family`'s representative type.
    pub fn offsets(&self, family: &Family) -> Option<&[u64]> {
        self.tables.get(family).map(|t| t.offsets.as_slice())
    }

    /// Per-group lengths of `family`'s representative type.
    pub fn lengths(&self, family: &Family) -> Option<&[u64]> {
        self.tables.get(family).map(|t| t.lengths.as_slice())
    }

    /// The on-disk type whose tables stand for `family`.
    pub fn representative(&self, family: &Family) -> Option<&str> {
        self.tables.get(family).map(|t| t.on_disk.as_str())
    }
}

fn read_table(snap: &Snapshot, root: &str, on_disk: &str) -> Result<GroupTable, HaloError> {
    let group = join_path(root, on_disk);
    let mut offsets = Vec::new();
    let mut lengths = Vec::new();
    for (shard_id, shard) in snap.shards().iter() {
        let offs = read_column(shard.read_dataset(&join_path(&group, OFFSET))?, &group, OFFSET)?;
        let lens = read_column(shard.read_dataset(&join_path(&group, LENGTH))?, &group, LENGTH)?;
        if offs.len() != lens.len() {
            return Err(HaloError::Format {
                reason: format!(
                    "{group} in shard {shard_id} has {} offsets but {} lengths",
                    offs.len(),
                    lens.len()
                ),
            });
        }
        offsets.extend(offs);
        lengths.extend(lens);
    }
    Ok(GroupTable {
        on_disk: on_disk.to_owned(),
        offsets,
        lengths,
    })
}

fn read_column(
    data: nbsnap_core::ArrayData,
    group: &str,
    name: &str,
) -> Result<Vec<u64>, HaloError> {
    let values = data.to_i64_vec().ok_or_else(|| HaloError::Format {
        reason: format!("{group}/{name} is not an integer table"),
    })?;
    values
        .into_iter()
        .map(|v| {
            u64::try_from(v).map_err(|_| HaloError::Format {
                reason: format!("{group}/{name} holds negative entry {v}"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbsnap_test_utils::{CatalogueBuilder, SnapshotBuilder};

    #[test]
    fn ordinary_snapshot_is_rejected() {
        let fx = SnapshotBuilder::new("snap", 1)
            .particles("PartType0", &[3])
            .build();
        let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
        assert!(matches!(
            HaloCatalogue::new(&snap),
            Err(HaloError::Format { .. })
        ));
    }

    #[test]
    fn tables_concatenate_in_shard_order() {
        let fx = CatalogueBuilder::new("fof", &[2, 0, 3]).build();
        let snap = Snapshot::open_subfind(fx.store(), fx.base()).unwrap();
        let cat = HaloCatalogue::new(&snap).unwrap();
        assert_eq!(cat.len(), 5);
        let gas = Family::from("gas");
        let expected: Vec<u64> = fx.offsets("PartType0").iter().map(|&o| o as u64).collect();
        assert_eq!(cat.offsets(&gas).unwrap(), expected.as_slice());
        assert_eq!(cat.representative(&gas), Some("PartType0"));
    }

    #[test]
    fn mismatched_group_total_is_format_error() {
        let fx = CatalogueBuilder::new("fof", &[2, 2]).total_groups(5).build();
        let snap = Snapshot::open_subfind(fx.store(), fx.base()).unwrap();
        assert!(matches!(
            HaloCatalogue::new(&snap),
            Err(HaloError::Format { .. })
        ));
    }
}
