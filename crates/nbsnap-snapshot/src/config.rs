//! Format tables, snapshot options, and the format registry.
//!
//! [`FormatConfig`] holds the two static tables a format needs: the
//! ordered family → on-disk-type table and the on-disk ↔ canonical name
//! table. [`FormatRegistry::global()`] is the process-wide, read-only set
//! of built-in formats. [`SnapshotOptions`] carries per-open settings,
//! including the [`Hierarchy`] that selects between an ordinary particle
//! snapshot and a group-catalogue snapshot.

use std::collections::HashMap;
use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::Deserialize;

use nbsnap_core::{ConfigError, Family};

use crate::names::NameTranslator;
use crate::properties::{self, Initializer};

// ── FormatConfig ───────────────────────────────────────────────────

/// Serialized form of a [`FormatConfig`].
///
/// ```json
/// {
///   "families": { "gas": ["PartType0"], "dm": ["PartType1"] },
///   "names": { "Coordinates": "pos", "Density": "rho" }
/// }
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FormatTables {
    /// Family → on-disk type names. Order is family iteration order.
    pub families: IndexMap<Family, Vec<String>>,
    /// On-disk name → canonical name.
    #[serde(default)]
    pub names: IndexMap<String, String>,
}

/// Validated tables for one on-disk format.
#[derive(Clone, Debug)]
pub struct FormatConfig {
    families: IndexMap<Family, Vec<String>>,
    names: NameTranslator,
}

impl FormatConfig {
    /// Build and validate a config from its tables.
    pub fn from_tables(tables: FormatTables) -> Result<Self, ConfigError> {
        let names = NameTranslator::new(tables.names)?;
        let config = Self {
            families: tables.families,
            names,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let tables: FormatTables = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        Self::from_tables(tables)
    }

    /// Built-in tables for Gadget-style HDF5 snapshots and SubFind
    /// group catalogues.
    pub fn gadget_hdf() -> Self {
        let families = [
            ("gas", &["PartType0"][..]),
            ("dm", &["PartType1"][..]),
            ("star", &["PartType2", "PartType3", "PartType4"][..]),
            ("bh", &["PartType5"][..]),
        ]
        .into_iter()
        .map(|(fam, types)| {
            (
                Family::from(fam),
                types.iter().map(|t| (*t).to_owned()).collect(),
            )
        })
        .collect();
        let names = NameTranslator::from_static(&[
            ("Coordinates", "pos"),
            ("Velocities", "vel"),
            ("ParticleIDs", "iord"),
            ("Mass", "mass"),
            ("Density", "rho"),
            ("Temperature", "temp"),
            ("InternalEnergy", "u"),
            ("SmoothingLength", "smooth"),
            ("Metallicity", "metals"),
            ("StarFormationRate", "sfr"),
            ("StellarFormationTime", "tform"),
            ("Potential", "phi"),
        ]);
        Self { families, names }
    }

    /// Check structural invariants of the tables.
    ///
    /// - At least one family.
    /// - No family with an empty type list.
    /// - No on-disk type claimed by two families.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.families.is_empty() {
            return Err(ConfigError::NoFamilies);
        }
        let mut owner: HashMap<&str, &Family> = HashMap::new();
        for (family, types) in &self.families {
            if types.is_empty() {
                return Err(ConfigError::EmptyFamily {
                    family: family.clone(),
                });
            }
            for t in types {
                if let Some(first) = owner.insert(t.as_str(), family) {
                    if first != family {
                        return Err(ConfigError::DuplicateType {
                            on_disk: t.clone(),
                            first: first.clone(),
                            second: family.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// The family → on-disk type table, in family iteration order.
    pub fn families(&self) -> &IndexMap<Family, Vec<String>> {
        &self.families
    }

    /// The name translator.
    pub fn names(&self) -> &NameTranslator {
        &self.names
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self::gadget_hdf()
    }
}

// ── FormatRegistry ─────────────────────────────────────────────────

/// Format id for ordinary Gadget-style HDF5 snapshots.
pub const GADGET_HDF: &str = "gadgethdf";

/// Format id for SubFind group-catalogue HDF5 output.
pub const SUBFIND_HDF: &str = "subfindhdf";

/// Format tables keyed by format id.
#[derive(Clone, Debug, Default)]
pub struct FormatRegistry {
    formats: IndexMap<String, FormatConfig>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in format.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(GADGET_HDF, FormatConfig::gadget_hdf());
        registry.insert(SUBFIND_HDF, FormatConfig::gadget_hdf());
        registry
    }

    /// The process-wide built-in registry, initialised on first use and
    /// read-only afterwards.
    pub fn global() -> &'static FormatRegistry {
        static GLOBAL: OnceLock<FormatRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::builtin)
    }

    /// Register (or replace) the tables for `format`.
    pub fn insert(&mut self, format: impl Into<String>, config: FormatConfig) {
        self.formats.insert(format.into(), config);
    }

    /// Tables for `format`.
    pub fn get(&self, format: &str) -> Result<&FormatConfig, ConfigError> {
        self.formats
            .get(format)
            .ok_or_else(|| ConfigError::UnknownFormat {
                format: format.to_owned(),
            })
    }

    /// Registered format ids, in registration order.
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }
}

// ── Hierarchy ──────────────────────────────────────────────────────

/// Default sub-hierarchy holding SubFind friends-of-friends output.
pub const DEFAULT_GROUP_ROOT: &str = "FOF";

/// Where particle-type groups live inside each shard, and where their
/// counts come from.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Hierarchy {
    /// Ordinary snapshot: type groups at the top level, per-type counts
    /// from each type's `Coordinates` first axis, shard count from
    /// `Header/NumFilesPerSnapshot`.
    #[default]
    Particles,
    /// Group catalogue: type groups under `root`, per-type counts from
    /// the `root` attribute `Number_per_Type`, shard count from the
    /// `root` attribute `NTask`.
    GroupCatalogue {
        /// Sub-hierarchy path, usually [`DEFAULT_GROUP_ROOT`].
        root: String,
    },
}

impl Hierarchy {
    /// Group-catalogue hierarchy rooted at [`DEFAULT_GROUP_ROOT`].
    pub fn group_catalogue() -> Self {
        Self::GroupCatalogue {
            root: DEFAULT_GROUP_ROOT.to_owned(),
        }
    }

    /// Path of the sub-hierarchy (`""` for the top level).
    pub fn root(&self) -> &str {
        match self {
            Self::Particles => "",
            Self::GroupCatalogue { root } => root,
        }
    }

    /// Whether this is a group-catalogue hierarchy.
    pub fn is_group_catalogue(&self) -> bool {
        matches!(self, Self::GroupCatalogue { .. })
    }
}

// ── SnapshotOptions ────────────────────────────────────────────────

/// How to treat a dataset whose row count disagrees with the declared
/// particle count of its type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ShapePolicy {
    /// Assume a flattened fixed-width array and infer the width as
    /// `elements / declared_count`, recording a warning. A non-integral
    /// width is still a format error.
    #[default]
    Heuristic,
    /// Any mismatch is a format error.
    Strict,
}

/// Settings for opening one snapshot.
#[derive(Clone, Debug)]
pub struct SnapshotOptions {
    /// Extension of sharded files: base `P` maps to `P.0.<ext>`,
    /// `P.1.<ext>`, ... Default: `"hdf5"`.
    pub extension: String,
    /// Which sub-hierarchy holds the particle-type groups.
    pub hierarchy: Hierarchy,
    /// Reshape policy for mismatched datasets.
    pub shape_policy: ShapePolicy,
    /// Run after construction, in order. Default: header properties,
    /// group-catalogue properties, then file units.
    pub initializers: Vec<Initializer>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            extension: "hdf5".to_owned(),
            hierarchy: Hierarchy::Particles,
            shape_policy: ShapePolicy::Heuristic,
            initializers: properties::default_initializers(),
        }
    }
}

impl SnapshotOptions {
    /// Default options for a group-catalogue snapshot.
    pub fn group_catalogue() -> Self {
        Self {
            hierarchy: Hierarchy::group_catalogue(),
            ..Self::default()
        }
    }

    /// Replace the shape policy.
    pub fn with_shape_policy(mut self, policy: ShapePolicy) -> Self {
        self.shape_policy = policy;
        self
    }

    /// Replace the initializer list.
    pub fn with_initializers(mut self, initializers: Vec<Initializer>) -> Self {
        self.initializers = initializers;
        self
    }
}
