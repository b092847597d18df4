//! Bidirectional on-disk ↔ canonical array-name translation.

use std::collections::HashMap;

use nbsnap_core::ConfigError;

/// Maps on-disk field names to canonical array names and back.
///
/// Names without a table entry translate to themselves in both
/// directions, so translation never fails.
#[derive(Clone, Debug, Default)]
pub struct NameTranslator {
    to_canonical: HashMap<String, String>,
    to_on_disk: HashMap<String, String>,
}

impl NameTranslator {
    /// Build from `(on_disk, canonical)` pairs.
    ///
    /// Fails if two on-disk names share a canonical name, since the
    /// reverse direction would then be ambiguous.
    pub fn new<I, A, B>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut t = Self::default();
        for (on_disk, canonical) in pairs {
            let (on_disk, canonical) = (on_disk.into(), canonical.into());
            if t.to_on_disk.contains_key(&canonical) {
                return Err(ConfigError::NameCollision { canonical });
            }
            t.to_on_disk.insert(canonical.clone(), on_disk.clone());
            t.to_canonical.insert(on_disk, canonical);
        }
        Ok(t)
    }

    /// Build from a static table known to be collision-free.
    pub(crate) fn from_static(pairs: &[(&str, &str)]) -> Self {
        let mut t = Self::default();
        for &(on_disk, canonical) in pairs {
            t.to_on_disk.insert(canonical.to_owned(), on_disk.to_owned());
            t.to_canonical.insert(on_disk.to_owned(), canonical.to_owned());
        }
        t
    }

    /// Canonical name for an on-disk name.
    pub fn to_canonical<'a>(&'a self, on_disk: &'a str) -> &'a str {
        self.to_canonical
            .get(on_disk)
            .map(String::as_str)
            .unwrap_or(on_disk)
    }

    /// On-disk name for a canonical name.
    pub fn to_on_disk<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.to_on_disk
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    /// Number of table entries.
    pub fn len(&self) -> usize {
        self.to_canonical.len()
    }

    /// Whether the table is empty (pure identity mapping).
    pub fn is_empty(&self) -> bool {
        self.to_canonical.is_empty()
    }
}
