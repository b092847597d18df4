//! HDF5 backend built on the `hdf5` crate.
//!
//! Only the numeric types that particle snapshots use are supported:
//! 32/64-bit signed and unsigned integers and 32/64-bit floats. String
//! attributes are read as variable-length or fixed ASCII.

use std::path::{Path, PathBuf};

use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Attribute, Container, File, Group};
use smallvec::SmallVec;
use tracing::debug;

use nbsnap_core::store::join_path;
use nbsnap_core::{ArrayData, DatasetInfo, Dtype, MetaValue, ShardHandle, ShardStore, StoreError};

fn backend(e: hdf5::Error) -> StoreError {
    StoreError::Backend {
        reason: e.to_string(),
    }
}

fn dtype_of(container: &Container) -> Result<Dtype, StoreError> {
    let descriptor = container
        .dtype()
        .and_then(|t| t.to_descriptor())
        .map_err(backend)?;
    match descriptor {
        TypeDescriptor::Integer(IntSize::U4) => Ok(Dtype::I32),
        TypeDescriptor::Integer(IntSize::U8) => Ok(Dtype::I64),
        TypeDescriptor::Unsigned(IntSize::U4) => Ok(Dtype::U32),
        TypeDescriptor::Unsigned(IntSize::U8) => Ok(Dtype::U64),
        TypeDescriptor::Float(FloatSize::U4) => Ok(Dtype::F32),
        TypeDescriptor::Float(FloatSize::U8) => Ok(Dtype::F64),
        other => Err(StoreError::Backend {
            reason: format!("unsupported element type {other:?}"),
        }),
    }
}

fn read_container(container: &Container) -> Result<ArrayData, StoreError> {
    let data = match dtype_of(container)? {
        Dtype::I32 => ArrayData::I32(container.read_raw::<i32>().map_err(backend)?),
        Dtype::I64 => ArrayData::I64(container.read_raw::<i64>().map_err(backend)?),
        Dtype::U32 => ArrayData::U32(container.read_raw::<u32>().map_err(backend)?),
        Dtype::U64 => ArrayData::U64(container.read_raw::<u64>().map_err(backend)?),
        Dtype::F32 => ArrayData::F32(container.read_raw::<f32>().map_err(backend)?),
        Dtype::F64 => ArrayData::F64(container.read_raw::<f64>().map_err(backend)?),
    };
    Ok(data)
}

fn read_attribute(attr: &Attribute) -> Result<MetaValue, StoreError> {
    if let Ok(s) = attr.read_scalar::<VarLenUnicode>() {
        return Ok(MetaValue::Str(s.to_string()));
    }
    if let Ok(s) = attr.read_scalar::<VarLenAscii>() {
        return Ok(MetaValue::Str(s.to_string()));
    }
    let scalar = attr.ndim() == 0;
    let value = match read_container(attr)? {
        ArrayData::F32(v) => floats(v.into_iter().map(f64::from).collect(), scalar),
        ArrayData::F64(v) => floats(v, scalar),
        other => {
            let ints = other.to_i64_vec().unwrap_or_default();
            if scalar {
                MetaValue::Int(ints.first().copied().unwrap_or(0))
            } else {
                MetaValue::IntArray(ints)
            }
        }
    };
    Ok(value)
}

fn floats(v: Vec<f64>, scalar: bool) -> MetaValue {
    if scalar {
        MetaValue::Float(v.first().copied().unwrap_or(0.0))
    } else {
        MetaValue::FloatArray(v)
    }
}

fn leaf_name(full: &str) -> String {
    full.rsplit('/').next().unwrap_or(full).to_owned()
}

/// Opens HDF5 files from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hdf5Store;

impl Hdf5Store {
    /// Create the store.
    pub fn new() -> Self {
        Self
    }
}

impl ShardStore for Hdf5Store {
    fn probe(&self, path: &Path) -> bool {
        path.is_file() && File::open(path).is_ok()
    }

    fn open(&self, path: &Path) -> Result<Box<dyn ShardHandle>, StoreError> {
        if !path.is_file() {
            return Err(StoreError::NotAContainer {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|_| StoreError::NotAContainer {
            path: path.to_path_buf(),
        })?;
        debug!(path = %path.display(), "opened hdf5 shard");
        Ok(Box::new(Hdf5Handle {
            path: path.to_path_buf(),
            file,
        }))
    }
}

struct Hdf5Handle {
    path: PathBuf,
    file: File,
}

impl Hdf5Handle {
    fn group(&self, path: &str) -> Result<Group, StoreError> {
        let target = if path.is_empty() { "/" } else { path };
        self.file
            .group(target)
            .map_err(|_| StoreError::MissingGroup {
                path: path.to_owned(),
            })
    }

    fn collect_datasets(
        group: &Group,
        prefix: &str,
        out: &mut Vec<String>,
    ) -> Result<(), StoreError> {
        for ds in group.datasets().map_err(backend)? {
            out.push(join_path(prefix, &leaf_name(&ds.name())));
        }
        for sub in group.groups().map_err(backend)? {
            let path = join_path(prefix, &leaf_name(&sub.name()));
            Self::collect_datasets(&sub, &path, out)?;
        }
        Ok(())
    }
}

impl ShardHandle for Hdf5Handle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn keys(&self, group: &str) -> Result<Vec<String>, StoreError> {
        self.group(group)?.member_names().map_err(backend)
    }

    fn is_group(&self, path: &str) -> bool {
        self.group(path).is_ok()
    }

    fn attribute(&self, group: &str, name: &str) -> Result<Option<MetaValue>, StoreError> {
        let g = self.group(group)?;
        let names = g.attr_names().map_err(backend)?;
        if !names.iter().any(|n| n == name) {
            return Ok(None);
        }
        let attr = g.attr(name).map_err(backend)?;
        read_attribute(&attr).map(Some)
    }

    fn attribute_names(&self, group: &str) -> Result<Vec<String>, StoreError> {
        self.group(group)?.attr_names().map_err(backend)
    }

    fn walk_datasets(&self, group: &str) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        Self::collect_datasets(&self.group(group)?, "", &mut out)?;
        Ok(out)
    }

    fn dataset_info(&self, path: &str) -> Result<DatasetInfo, StoreError> {
        let ds = self
            .file
            .dataset(path)
            .map_err(|_| StoreError::MissingDataset {
                path: path.to_owned(),
            })?;
        Ok(DatasetInfo {
            dtype: dtype_of(&ds)?,
            shape: ds.shape().into_iter().collect::<SmallVec<_>>(),
        })
    }

    fn read_dataset(&self, path: &str) -> Result<ArrayData, StoreError> {
        let ds = self
            .file
            .dataset(path)
            .map_err(|_| StoreError::MissingDataset {
                path: path.to_owned(),
            })?;
        read_container(&ds)
    }
}
