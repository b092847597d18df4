//! Effective family → on-disk type mapping.
//!
//! The static table says which on-disk types *may* belong to a family;
//! [`TypeMapper::resolve`] intersects it with the type groups actually
//! present in a shard. Only the first shard is consulted: presence of
//! type groups is assumed uniform across the shards of one snapshot.

use indexmap::IndexMap;
use smallvec::SmallVec;

use nbsnap_core::{Family, SnapshotError};

/// On-disk type names contributing to one family, in table order.
pub type TypeList = SmallVec<[String; 2]>;

/// Effective mapping from each present family to its present on-disk types.
///
/// Families with no present type are omitted. Iteration order is the
/// static table's family order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeMap {
    families: IndexMap<Family, TypeList>,
}

impl TypeMap {
    /// Families in iteration order.
    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.keys()
    }

    /// `(family, types)` pairs in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Family, &[String])> {
        self.families.iter().map(|(f, t)| (f, t.as_slice()))
    }

    /// On-disk types of `family`, or `None` if the family is absent.
    pub fn types(&self, family: &Family) -> Option<&[String]> {
        self.families.get(family).map(|t| t.as_slice())
    }

    /// The first on-disk type of `family`, used where a single type
    /// stands for the whole family (halo offset tables).
    pub fn representative(&self, family: &Family) -> Option<&str> {
        self.families
            .get(family)
            .and_then(|t| t.first())
            .map(String::as_str)
    }

    /// Every present on-disk type, in family order then table order.
    pub fn all_types(&self) -> impl Iterator<Item = &str> {
        self.families.values().flatten().map(String::as_str)
    }

    /// Whether `family` is present.
    pub fn contains(&self, family: &Family) -> bool {
        self.families.contains_key(family)
    }

    /// Number of present families.
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Whether no family is present.
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}

/// Computes a [`TypeMap`] from a static family table.
#[derive(Clone, Copy, Debug)]
pub struct TypeMapper<'a> {
    table: &'a IndexMap<Family, Vec<String>>,
}

impl<'a> TypeMapper<'a> {
    /// Mapper over a family → on-disk types table.
    pub fn new(table: &'a IndexMap<Family, Vec<String>>) -> Self {
        Self { table }
    }

    /// Keep, for each family, the types whose names are in `present`.
    pub fn resolve<S: AsRef<str>>(&self, present: &[S]) -> TypeMap {
        let mut families = IndexMap::new();
        for (family, types) in self.table {
            let found: TypeList = types
                .iter()
                .filter(|t| present.iter().any(|p| p.as_ref() == t.as_str()))
                .cloned()
                .collect();
            if !found.is_empty() {
                families.insert(family.clone(), found);
            }
        }
        TypeMap { families }
    }
}

/// Numeric index of an on-disk type, from its trailing decimal digits
/// (`"PartType4"` → 4). Indexes per-type header arrays such as
/// `MassTable` and `Number_per_Type`.
pub fn type_index(on_disk: &str) -> Result<usize, SnapshotError> {
    let digits_start = on_disk
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    on_disk[digits_start..]
        .parse()
        .map_err(|_| SnapshotError::Format {
            reason: format!("on-disk type '{on_disk}' has no numeric suffix"),
        })
}
