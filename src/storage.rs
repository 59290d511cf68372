use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};
use zarrs::array::{Array, ArrayMetadata, ArrayMetadataOptions};
use zarrs::group::{Group, GroupMetadata};
use zarrs::metadata::v2::{
    ArrayMetadataV2, DataTypeMetadataV2, FillValueMetadataV2, GroupMetadataV2,
};
use zarrs::storage::{
    ListableStorageTraits, ReadableStorageTraits, StoreKey, StorePrefix, WritableStorageTraits,
};

use crate::chunk::ChunkShape;
use crate::chunk_key_encoding::DimensionSeparator;
use crate::data::{DataType, ImageData, with_image_data};

const ZARRAY: &str = ".zarray";
const ZATTRS: &str = ".zattrs";
const ZGROUP: &str = ".zgroup";

/// An array written to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelHandle {
    /// Path from the store root, without leading or trailing `/`.
    pub path: String,
    /// Last path component, e.g. `s0`.
    pub name: String,
    pub shape: Vec<u64>,
    pub chunks: ChunkShape,
    pub data_type: DataType,
    pub separator: DimensionSeparator,
}

/// A chunked hierarchical array store with per-node attribute documents.
///
/// Paths are `/`-separated and relative to the store root; `""` is the root.
pub trait StoreWriter: Send + Sync {
    /// Create a group and any missing parent groups.
    fn create_group(&self, path: &str) -> crate::Result<()>;

    /// Create an empty array. Fails with [`crate::Error::ArrayExists`] if
    /// `path` already holds one.
    fn create_array(
        &self,
        path: &str,
        shape: &[u64],
        data_type: DataType,
        chunks: &ChunkShape,
        separator: DimensionSeparator,
    ) -> crate::Result<LevelHandle>;

    /// Write every chunk of `data` into `level`.
    fn write_array(&self, level: &LevelHandle, data: &ImageData) -> crate::Result<()>;

    fn open_array(&self, path: &str) -> crate::Result<LevelHandle>;

    /// Names of the arrays directly under `group`, in level order.
    fn list_arrays(&self, group: &str) -> crate::Result<Vec<String>>;

    fn attributes(&self, path: &str) -> crate::Result<Map<String, Value>>;

    fn set_attributes(&self, path: &str, attributes: Map<String, Value>) -> crate::Result<()>;

    /// Read-modify-write the attributes of `path`.
    ///
    /// Not atomic by default; implementations shared between writers must
    /// serialise it.
    fn update_attributes(
        &self,
        path: &str,
        update: &mut dyn FnMut(&mut Map<String, Value>) -> crate::Result<()>,
    ) -> crate::Result<()> {
        let mut attributes = self.attributes(path)?;
        update(&mut attributes)?;
        self.set_attributes(path, attributes)
    }
}

/// Join store paths, dropping empty components and stray separators.
pub fn join_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_matches('/');
    let child = child.trim_matches('/');
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_owned(),
        (false, true) => parent.to_owned(),
        (false, false) => format!("{parent}/{child}"),
    }
}

/// Sort key putting `s2` before `s10`.
fn level_sort_key(name: &str) -> (&str, Option<u64>, &str) {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = name[stem.len()..].parse().ok();
    (stem, number, name)
}

/// Uncompressed, C-ordered Zarr V2 array metadata with a zero fill value.
fn array_metadata_v2(
    shape: &[u64],
    data_type: DataType,
    chunks: &ChunkShape,
    separator: DimensionSeparator,
) -> ArrayMetadataV2 {
    let fill_value = if data_type.is_float() {
        FillValueMetadataV2::from(0.0f64)
    } else {
        FillValueMetadataV2::from(0u8)
    };
    ArrayMetadataV2::new(
        shape.to_vec(),
        chunks.to_nonzero(),
        DataTypeMetadataV2::from(data_type.zarr_v2_dtype()),
        fill_value,
        None,
        None,
    )
    .with_dimension_separator(separator.into())
}

/// Writes Zarr V2 hierarchies into any `zarrs` key/value store.
///
/// Attribute updates are serialised, so one `ZarrStore` can be shared by
/// several pyramids writing into the same document.
pub struct ZarrStore<S> {
    inner: Arc<S>,
    attributes_lock: Mutex<()>,
}

impl<S> ZarrStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            attributes_lock: Mutex::new(()),
        }
    }

    /// The underlying store, e.g. for reading arrays back with `zarrs`.
    pub fn storage(&self) -> Arc<S> {
        Arc::clone(&self.inner)
    }
}

fn node_key(path: &str, file: &str) -> crate::Result<StoreKey> {
    StoreKey::new(join_path(path, file)).map_err(crate::Error::wrap)
}

/// `zarrs` node paths are absolute.
fn node_path(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

impl<S> ZarrStore<S>
where
    S: ReadableStorageTraits + WritableStorageTraits + ListableStorageTraits,
{
    fn get_json(&self, key: &StoreKey) -> crate::Result<Option<Value>> {
        match self.inner.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_json(&self, key: &StoreKey, value: &impl Serialize) -> crate::Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.inner.set(key, Bytes::from(bytes))?;
        Ok(())
    }

    fn read_attributes(&self, path: &str) -> crate::Result<Map<String, Value>> {
        match self.get_json(&node_key(path, ZATTRS)?)? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(crate::Error::invalid_attributes(
                path,
                "attributes are not a JSON object",
            )),
        }
    }
}

impl<S> StoreWriter for ZarrStore<S>
where
    S: ReadableStorageTraits
        + WritableStorageTraits
        + ListableStorageTraits
        + Send
        + Sync
        + 'static,
{
    fn create_group(&self, path: &str) -> crate::Result<()> {
        let path = path.trim_matches('/');
        let mut current = String::new();
        let components = std::iter::once("").chain(path.split('/').filter(|c| !c.is_empty()));
        for component in components {
            current = join_path(&current, component);
            let key = node_key(&current, ZGROUP)?;
            if self.inner.size_key(&key)?.is_none() {
                let metadata = GroupMetadata::V2(GroupMetadataV2::new());
                Group::new_with_metadata(self.storage(), &node_path(&current), metadata)?
                    .store_metadata()?;
                debug!("created group {current:?}");
            }
        }
        Ok(())
    }

    fn create_array(
        &self,
        path: &str,
        shape: &[u64],
        data_type: DataType,
        chunks: &ChunkShape,
        separator: DimensionSeparator,
    ) -> crate::Result<LevelHandle> {
        if chunks.len() != shape.len() {
            return Err(crate::Error::InvalidChunkShape(format!(
                "chunk shape {:?} does not match array shape {shape:?}",
                chunks.as_slice()
            )));
        }
        let path = path.trim_matches('/').to_owned();
        let name = path.rsplit('/').next().unwrap_or_default().to_owned();
        if name.is_empty() {
            return Err(crate::Error::general("cannot create an array at the store root"));
        }
        if self.inner.size_key(&node_key(&path, ZARRAY)?)?.is_some() {
            return Err(crate::Error::ArrayExists(path));
        }
        let metadata = array_metadata_v2(shape, data_type, chunks, separator);
        let array = Array::new_with_metadata(
            self.storage(),
            &node_path(&path),
            ArrayMetadata::V2(metadata),
        )?;
        // the array `.zattrs` is left to `_ARRAY_DIMENSIONS`
        array.store_metadata_opt(
            &ArrayMetadataOptions::default().with_include_zarrs_metadata(false),
        )?;
        debug!("array metadata stored at {path:?}");
        Ok(LevelHandle {
            path,
            name,
            shape: shape.to_vec(),
            chunks: chunks.clone(),
            data_type,
            separator,
        })
    }

    fn write_array(&self, level: &LevelHandle, data: &ImageData) -> crate::Result<()> {
        if data.data_type() != level.data_type {
            return Err(crate::Error::DtypeDrift {
                expected: level.data_type,
                found: data.data_type(),
            });
        }
        if data.shape_u64() != level.shape {
            return Err(crate::Error::general(format!(
                "data shape {:?} does not match array shape {:?} at {:?}",
                data.shape(),
                level.shape,
                level.path
            )));
        }
        let array = Array::open(self.storage(), &node_path(&level.path))?;
        with_image_data!(data, a => array.store_array_subset(&array.subset_all(), a))?;
        debug!("stored level {:?} with shape {:?}", level.path, level.shape);
        Ok(())
    }

    fn open_array(&self, path: &str) -> crate::Result<LevelHandle> {
        let path = path.trim_matches('/').to_owned();
        let array = Array::open(self.storage(), &node_path(&path))?;
        let ArrayMetadata::V2(metadata) = array.metadata() else {
            return Err(crate::Error::general(format!(
                "{path:?} is not a Zarr V2 array"
            )));
        };
        let data_type = match &metadata.dtype {
            DataTypeMetadataV2::Simple(dtype) => DataType::from_zarr_v2_dtype(dtype),
            DataTypeMetadataV2::Structured(_) => None,
        }
        .ok_or_else(|| {
            crate::Error::general(format!("unsupported dtype {} at {path:?}", metadata.dtype))
        })?;
        let name = path.rsplit('/').next().unwrap_or_default().to_owned();
        Ok(LevelHandle {
            name,
            shape: metadata.shape.clone(),
            chunks: ChunkShape::new(metadata.chunks.iter().map(|n| n.get()).collect::<Vec<_>>())?,
            data_type,
            separator: metadata.dimension_separator.into(),
            path,
        })
    }

    fn list_arrays(&self, group: &str) -> crate::Result<Vec<String>> {
        let group = group.trim_matches('/');
        let prefix = if group.is_empty() {
            String::new()
        } else {
            format!("{group}/")
        };
        let prefix = StorePrefix::new(prefix).map_err(crate::Error::wrap)?;
        let listing = self.inner.list_dir(&prefix)?;
        let mut names = Vec::new();
        for child in listing.prefixes() {
            let child = child.as_str().trim_end_matches('/');
            if self.inner.size_key(&node_key(child, ZARRAY)?)?.is_some() {
                let name = child.rsplit('/').next().unwrap_or(child);
                names.push(name.to_owned());
            }
        }
        names.sort_by(|a, b| level_sort_key(a).cmp(&level_sort_key(b)));
        Ok(names)
    }

    fn attributes(&self, path: &str) -> crate::Result<Map<String, Value>> {
        self.read_attributes(path)
    }

    fn set_attributes(&self, path: &str, attributes: Map<String, Value>) -> crate::Result<()> {
        self.set_json(&node_key(path, ZATTRS)?, &attributes)
    }

    fn update_attributes(
        &self,
        path: &str,
        update: &mut dyn FnMut(&mut Map<String, Value>) -> crate::Result<()>,
    ) -> crate::Result<()> {
        let _guard = self
            .attributes_lock
            .lock()
            .map_err(|_| crate::Error::general("attribute lock poisoned"))?;
        let mut attributes = self.read_attributes(path)?;
        update(&mut attributes)?;
        self.set_attributes(path, attributes)
    }
}
