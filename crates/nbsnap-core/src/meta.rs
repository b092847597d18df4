//! Header attribute values.

use std::fmt;

/// A scalar or array value read from a shard's header attributes.
///
/// Header metadata is small and heterogeneous (shard counts, per-type
/// particle counts, the mass table, cosmological parameters), so values
/// are kept in a loosely-typed enum and converted at the point of use.
#[derive(Clone, Debug, PartialEq)]
pub enum MetaValue {
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// String scalar.
    Str(String),
    /// Integer array (e.g. `NumPart_ThisFile`).
    IntArray(Vec<i64>),
    /// Floating-point array (e.g. `MassTable`).
    FloatArray(Vec<f64>),
}

impl MetaValue {
    /// The value as an `f64` scalar, converting integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as an `i64` scalar. Floats convert only if integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Element `i` of an array value, as `f64`.
    pub fn index_f64(&self, i: usize) -> Option<f64> {
        match self {
            Self::IntArray(v) => v.get(i).map(|&x| x as f64),
            Self::FloatArray(v) => v.get(i).copied(),
            _ => None,
        }
    }

    /// Element `i` of an array value, as `i64`.
    pub fn index_i64(&self, i: usize) -> Option<i64> {
        match self {
            Self::IntArray(v) => v.get(i).copied(),
            Self::FloatArray(v) => v.get(i).filter(|x| x.fract() == 0.0).map(|&x| x as i64),
            _ => None,
        }
    }

    /// The value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::IntArray(v) => write!(f, "{v:?}"),
            Self::FloatArray(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<Vec<i64>> for MetaValue {
    fn from(v: Vec<i64>) -> Self {
        Self::IntArray(v)
    }
}

impl From<Vec<f64>> for MetaValue {
    fn from(v: Vec<f64>) -> Self {
        Self::FloatArray(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_conversions() {
        assert_eq!(MetaValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(MetaValue::Float(4.0).as_i64(), Some(4));
        assert_eq!(MetaValue::Float(4.5).as_i64(), None);
        assert_eq!(MetaValue::from("x").as_f64(), None);
    }

    #[test]
    fn array_indexing() {
        let table = MetaValue::FloatArray(vec![0.0, 2.5]);
        assert_eq!(table.index_f64(1), Some(2.5));
        assert_eq!(table.index_f64(2), None);
        assert_eq!(table.index_i64(1), None);
        let counts = MetaValue::IntArray(vec![10, 20]);
        assert_eq!(counts.index_i64(0), Some(10));
        assert_eq!(counts.as_i64(), None);
    }
}
