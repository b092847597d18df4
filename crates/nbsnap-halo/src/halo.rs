//! A resolved group and its particle list.

use nbsnap_core::{HaloError, HaloId, ParticleArray, SnapshotId};
use nbsnap_snapshot::Snapshot;

/// One group: the global indices of its particles, family by family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Halo {
    id: HaloId,
    snapshot: SnapshotId,
    particles: Vec<usize>,
}

impl Halo {
    pub(crate) fn new(id: HaloId, snapshot: SnapshotId, particles: Vec<usize>) -> Self {
        Self {
            id,
            snapshot,
            particles,
        }
    }

    /// Group id.
    pub fn id(&self) -> HaloId {
        self.id
    }

    /// Id of the snapshot the indices refer to.
    pub fn snapshot(&self) -> SnapshotId {
        self.snapshot
    }

    /// Global particle indices, ascending within each family.
    pub fn particles(&self) -> &[usize] {
        &self.particles
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the group owns no particles.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Rows of the whole-snapshot array `name` for this group's
    /// particles, loading the array if needed.
    pub fn gather(&self, snap: &mut Snapshot, name: &str) -> Result<ParticleArray, HaloError> {
        if snap.id() != self.snapshot {
            return Err(HaloError::Format {
                reason: format!(
                    "halo {} belongs to snapshot {}, not {}",
                    self.id,
                    self.snapshot,
                    snap.id()
                ),
            });
        }
        let array = snap.load(name, None)?;
        array
            .take_rows(&self.particles)
            .ok_or_else(|| HaloError::Format {
                reason: format!("halo {} indexes past the end of '{name}'", self.id),
            })
    }
}
