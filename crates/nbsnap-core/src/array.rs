//! Typed particle arrays: [`Dtype`], [`ArrayData`], and [`ParticleArray`].
//!
//! Arrays are stored flat and row-major. A [`ParticleArray`] adds the
//! per-particle width (`dims`: 1 for scalars, 3 for positions, ...) so
//! that row `i` occupies elements `i * dims .. (i + 1) * dims`.

use std::ops::Range;

use crate::error::SnapshotError;

/// Element type of an on-disk dataset or a loaded array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl Dtype {
    /// Size of one element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Whether the type is a floating-point type.
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// Flat, typed element storage.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    /// `i32` elements.
    I32(Vec<i32>),
    /// `i64` elements.
    I64(Vec<i64>),
    /// `u32` elements.
    U32(Vec<u32>),
    /// `u64` elements.
    U64(Vec<u64>),
    /// `f32` elements.
    F32(Vec<f32>),
    /// `f64` elements.
    F64(Vec<f64>),
}

/// Apply `$body` to the inner vector of any variant, binding it as `$v`.
macro_rules! each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::I32($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
        }
    };
}

/// Same as `each_variant`, but rebuilds an `ArrayData` of the same variant.
macro_rules! map_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::I32($v) => ArrayData::I32($body),
            ArrayData::I64($v) => ArrayData::I64($body),
            ArrayData::U32($v) => ArrayData::U32($body),
            ArrayData::U64($v) => ArrayData::U64($body),
            ArrayData::F32($v) => ArrayData::F32($body),
            ArrayData::F64($v) => ArrayData::F64($body),
        }
    };
}

/// Element-wise `as` conversion from any source variant into `$dst: &mut [$t]`.
macro_rules! cast_into {
    ($dst:expr, $t:ty, $src:expr) => {
        each_variant!($src, s => {
            for (d, &v) in $dst.iter_mut().zip(s.iter()) {
                *d = v as $t;
            }
        })
    };
}

impl ArrayData {
    /// Zero-initialised storage of `len` elements.
    pub fn zeros(dtype: Dtype, len: usize) -> Self {
        match dtype {
            Dtype::I32 => Self::I32(vec![0; len]),
            Dtype::I64 => Self::I64(vec![0; len]),
            Dtype::U32 => Self::U32(vec![0; len]),
            Dtype::U64 => Self::U64(vec![0; len]),
            Dtype::F32 => Self::F32(vec![0.0; len]),
            Dtype::F64 => Self::F64(vec![0.0; len]),
        }
    }

    /// Element type of the storage.
    pub fn dtype(&self) -> Dtype {
        match self {
            Self::I32(_) => Dtype::I32,
            Self::I64(_) => Dtype::I64,
            Self::U32(_) => Dtype::U32,
            Self::U64(_) => Dtype::U64,
            Self::F32(_) => Dtype::F32,
            Self::F64(_) => Dtype::F64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `src` into `self` starting at element `offset`, converting
    /// element types with `as` semantics when they differ.
    pub fn copy_from(&mut self, offset: usize, src: &ArrayData) -> Result<(), SnapshotError> {
        let end = offset + src.len();
        if end > self.len() {
            return Err(SnapshotError::Format {
                reason: format!(
                    "write of {} elements at offset {offset} overruns buffer of {}",
                    src.len(),
                    self.len()
                ),
            });
        }
        match (self, src) {
            (Self::I32(d), Self::I32(s)) => d[offset..end].copy_from_slice(s),
            (Self::I64(d), Self::I64(s)) => d[offset..end].copy_from_slice(s),
            (Self::U32(d), Self::U32(s)) => d[offset..end].copy_from_slice(s),
            (Self::U64(d), Self::U64(s)) => d[offset..end].copy_from_slice(s),
            (Self::F32(d), Self::F32(s)) => d[offset..end].copy_from_slice(s),
            (Self::F64(d), Self::F64(s)) => d[offset..end].copy_from_slice(s),
            (Self::I32(d), s) => cast_into!(d[offset..end], i32, s),
            (Self::I64(d), s) => cast_into!(d[offset..end], i64, s),
            (Self::U32(d), s) => cast_into!(d[offset..end], u32, s),
            (Self::U64(d), s) => cast_into!(d[offset..end], u64, s),
            (Self::F32(d), s) => cast_into!(d[offset..end], f32, s),
            (Self::F64(d), s) => cast_into!(d[offset..end], f64, s),
        }
        Ok(())
    }

    /// Copy of the elements in `range`. Returns `None` if out of bounds.
    pub fn slice(&self, range: Range<usize>) -> Option<ArrayData> {
        if range.start > range.end || range.end > self.len() {
            return None;
        }
        Some(map_variant!(self, v => v[range.clone()].to_vec()))
    }

    /// Element `i` converted to `f64`.
    pub fn get_f64(&self, i: usize) -> Option<f64> {
        each_variant!(self, v => v.get(i).map(|&x| x as f64))
    }

    /// All elements converted to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        each_variant!(self, v => v.iter().map(|&x| x as f64).collect())
    }

    /// Borrow as `f32` elements, if that is the storage type.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as `f64` elements, if that is the storage type.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as `i64` elements, if that is the storage type.
    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Mutably borrow as `f32` elements, if that is the storage type.
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match self {
            Self::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Mutably borrow as `f64` elements, if that is the storage type.
    pub fn as_f64_mut(&mut self) -> Option<&mut [f64]> {
        match self {
            Self::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Integer view of the elements, for offset/length tables.
    ///
    /// Returns `None` for float storage.
    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            Self::I32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            Self::I64(v) => Some(v.clone()),
            Self::U32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            Self::U64(v) => Some(v.iter().map(|&x| x as i64).collect()),
            Self::F32(_) | Self::F64(_) => None,
        }
    }
}

/// A materialised per-particle array: flat storage plus row width.
///
/// The width is never zero; every constructor rejects it.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleArray {
    data: ArrayData,
    dims: usize,
}

impl ParticleArray {
    /// Zero-initialised array of `rows` particles, `dims` values each.
    /// Fails if `dims` is zero.
    pub fn zeros(dtype: Dtype, rows: usize, dims: usize) -> Result<Self, SnapshotError> {
        if dims == 0 {
            return Err(zero_width());
        }
        Ok(Self {
            data: ArrayData::zeros(dtype, rows * dims),
            dims,
        })
    }

    /// Wrap existing storage. Fails if the element count is not a
    /// multiple of `dims`, or `dims` is zero.
    pub fn from_data(data: ArrayData, dims: usize) -> Result<Self, SnapshotError> {
        if dims == 0 {
            return Err(zero_width());
        }
        if data.len() % dims != 0 {
            return Err(SnapshotError::Format {
                reason: format!("{} elements do not divide into rows of {dims}", data.len()),
            });
        }
        Ok(Self { data, dims })
    }

    /// Number of particles (rows).
    pub fn rows(&self) -> usize {
        self.data.len() / self.dims
    }

    /// Values per particle: 1 for scalars, k for k-vectors.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Element type.
    pub fn dtype(&self) -> Dtype {
        self.data.dtype()
    }

    /// Flat element storage.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Mutable flat element storage. Edits are never written back to disk.
    pub fn data_mut(&mut self) -> &mut ArrayData {
        &mut self.data
    }

    /// Consume the array, returning its flat storage.
    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Copy flat `src` elements into rows starting at `row`.
    pub fn write_rows(&mut self, row: usize, src: &ArrayData) -> Result<(), SnapshotError> {
        if src.len() % self.dims != 0 {
            return Err(SnapshotError::Format {
                reason: format!(
                    "{} source elements do not divide into rows of {}",
                    src.len(),
                    self.dims
                ),
            });
        }
        self.data.copy_from(row * self.dims, src)
    }

    /// Copy of the rows in `range`. Returns `None` if out of bounds.
    pub fn rows_slice(&self, range: Range<usize>) -> Option<ParticleArray> {
        let data = self
            .data
            .slice(range.start * self.dims..range.end * self.dims)?;
        Some(Self {
            data,
            dims: self.dims,
        })
    }

    /// Gather the given rows, in the given order. Returns `None` if any
    /// index is out of bounds.
    pub fn take_rows(&self, rows: &[usize]) -> Option<ParticleArray> {
        let n = self.rows();
        if rows.iter().any(|&r| r >= n) {
            return None;
        }
        let dims = self.dims;
        let data = map_variant!(&self.data, v => {
            let mut out = Vec::with_capacity(rows.len() * dims);
            for &r in rows {
                out.extend_from_slice(&v[r * dims..(r + 1) * dims]);
            }
            out
        });
        Some(Self { data, dims })
    }
}

fn zero_width() -> SnapshotError {
    SnapshotError::Format {
        reason: "particle arrays need at least one value per row".to_owned(),
    }
}
