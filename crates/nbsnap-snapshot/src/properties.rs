//! Snapshot properties and file units, filled from header metadata.
//!
//! Both are populated by [`Initializer`]s that run once, in order, right
//! after a [`Snapshot`] is constructed. Missing metadata is never fatal:
//! absent attributes are skipped and absent unit blocks fall back to
//! defaults.

use indexmap::IndexMap;
use tracing::{debug, warn};

use nbsnap_core::{MetaValue, ShardHandle, SnapshotError, StoreError};

use crate::shards::HEADER;
use crate::snapshot::Snapshot;

/// A post-construction hook run against a freshly opened snapshot.
pub type Initializer = fn(&mut Snapshot) -> Result<(), SnapshotError>;

/// The default initializer order: header properties, group-catalogue
/// properties, then file units.
pub fn default_initializers() -> Vec<Initializer> {
    vec![header_properties, group_properties, file_units]
}

// ── Properties ─────────────────────────────────────────────────────

/// Named snapshot-wide scalar and array properties, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
    values: IndexMap<String, MetaValue>,
}

impl Properties {
    /// Empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Property `name`.
    pub fn get(&self, name: &str) -> Option<&MetaValue> {
        self.values.get(name)
    }

    /// Property `name` as a float, if numeric.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(MetaValue::as_f64)
    }

    /// Set property `name`, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Option<MetaValue> {
        self.values.insert(name.into(), value.into())
    }

    /// Whether property `name` is set.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Header attributes renamed to a property; everything else is copied
/// under its own name.
const RENAMED: &[(&str, &str)] = &[
    ("Time_GYR", "time"),
    ("OmegaBaryon", "omegaB0"),
    ("Omega0", "omegaM0"),
    ("OmegaLambda", "omegaL0"),
    ("BoxSize", "boxsize"),
    ("HubbleParam", "h"),
];

fn group_attributes(
    shard: &dyn ShardHandle,
    group: &str,
) -> Result<Option<IndexMap<String, MetaValue>>, SnapshotError> {
    let names = match shard.attribute_names(group) {
        Ok(names) => names,
        Err(StoreError::MissingGroup { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut attrs = IndexMap::with_capacity(names.len());
    for name in names {
        if let Some(value) = shard.attribute(group, &name)? {
            attrs.insert(name, value);
        }
    }
    Ok(Some(attrs))
}

/// Populate cosmological properties from the first shard's header.
///
/// `a` comes from `ExpansionFactor`, else `1/(1+Redshift)`, else 1;
/// `z = 1/a - 1`. Standard attributes are renamed (`Omega0` → `omegaM0`,
/// `HubbleParam` → `h`, ...) and every other attribute is copied.
pub fn header_properties(snap: &mut Snapshot) -> Result<(), SnapshotError> {
    let Some(attrs) = group_attributes(snap.shards().first(), HEADER)? else {
        debug!(path = %snap.path().display(), "no header group; skipping properties");
        return Ok(());
    };

    let a = attrs
        .get("ExpansionFactor")
        .and_then(MetaValue::as_f64)
        .or_else(|| {
            attrs
                .get("Redshift")
                .and_then(MetaValue::as_f64)
                .map(|z| 1.0 / (1.0 + z))
        })
        .unwrap_or(1.0);

    let props = snap.properties_mut();
    props.insert("a", a);
    for (name, value) in &attrs {
        if name == "ExpansionFactor" {
            continue;
        }
        match RENAMED.iter().find(|(on_disk, _)| *on_disk == name.as_str()) {
            Some((_, renamed)) => props.insert(*renamed, value.clone()),
            None => props.insert(name.as_str(), value.clone()),
        };
    }
    props.insert("z", 1.0 / a - 1.0);
    Ok(())
}

/// Copy every attribute of the group-catalogue root into the properties.
/// Does nothing for ordinary snapshots.
pub fn group_properties(snap: &mut Snapshot) -> Result<(), SnapshotError> {
    let root = snap.hierarchy().root().to_owned();
    if !snap.hierarchy().is_group_catalogue() {
        return Ok(());
    }
    let Some(attrs) = group_attributes(snap.shards().first(), &root)? else {
        return Ok(());
    };
    let props = snap.properties_mut();
    for (name, value) in attrs {
        props.insert(name, value);
    }
    Ok(())
}

// ── Units ──────────────────────────────────────────────────────────

/// Gravitational constant in cm³ g⁻¹ s⁻².
pub const G_CGS: f64 = 6.674_30e-8;

/// One kiloparsec in cm.
pub const KPC_CM: f64 = 3.085_677_581_491_367e21;

/// One solar mass in g.
pub const MSOL_G: f64 = 1.988_409_87e33;

/// Base units the file's arrays are expressed in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FileUnits {
    /// Velocity unit in cm/s.
    pub velocity_cm_per_s: f64,
    /// Length unit in cm (per `h` when `per_h`).
    pub length_cm: f64,
    /// Mass unit in g (per `h` when `per_h`).
    pub mass_g: f64,
    /// Whether the run used comoving integration.
    pub cosmological: bool,
    /// Whether length and mass carry a factor of `h⁻¹`.
    pub per_h: bool,
    /// Whether these are defaults substituted for a missing unit block.
    pub defaulted: bool,
}

impl Default for FileUnits {
    /// 1 kpc, 1e10 Msol, and the velocity that makes G = 1.
    fn default() -> Self {
        let length_cm = KPC_CM;
        let mass_g = 1e10 * MSOL_G;
        Self {
            velocity_cm_per_s: (G_CGS * mass_g / length_cm).sqrt(),
            length_cm,
            mass_g,
            cosmological: false,
            per_h: false,
            defaulted: true,
        }
    }
}

impl FileUnits {
    /// Time unit in s implied by length and velocity.
    pub fn time_s(&self) -> f64 {
        self.length_cm / self.velocity_cm_per_s
    }
}

fn is_cosmological(shard: &dyn ShardHandle) -> bool {
    let comoving = shard
        .attribute("Parameters/NumericalParameters", "ComovingIntegrationOn")
        .ok()
        .flatten()
        .and_then(|v| v.as_f64());
    match comoving {
        Some(flag) => flag != 0.0,
        None => matches!(shard.attribute(HEADER, "HubbleParam"), Ok(Some(_))),
    }
}

/// Read the `Units` group of the first shard.
///
/// Length and mass are per `h` for cosmological runs. When the group is
/// absent a warning is logged and [`FileUnits::default`] is used.
pub fn file_units(snap: &mut Snapshot) -> Result<(), SnapshotError> {
    let shard = snap.shards().first();
    let cosmological = is_cosmological(shard);
    let Some(attrs) = group_attributes(shard, "Units")? else {
        warn!(path = %snap.path().display(), "no unit information found; using defaults");
        snap.set_units(FileUnits {
            cosmological,
            ..FileUnits::default()
        });
        return Ok(());
    };

    let read = |name: &str| {
        attrs
            .get(name)
            .and_then(MetaValue::as_f64)
            .ok_or_else(|| StoreError::MissingAttribute {
                group: "Units".to_owned(),
                name: name.to_owned(),
            })
    };
    let units = FileUnits {
        velocity_cm_per_s: read("UnitVelocity_in_cm_per_s")?,
        length_cm: read("UnitLength_in_cm")?,
        mass_g: read("UnitMass_in_g")?,
        cosmological,
        per_h: cosmological,
        defaulted: false,
    };
    debug!(?units, "read file units");
    snap.set_units(units);
    Ok(())
}
