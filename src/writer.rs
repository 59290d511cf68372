//! Writing a whole multiscale image: pyramid levels, then metadata.

use log::info;
use serde::{Deserialize, Serialize};

use crate::axis::{AxisLayout, AxisName};
use crate::chunk::ChunkShape;
use crate::chunk_key_encoding::DimensionSeparator;
use crate::data::ImageData;
use crate::metadata::{
    DEFAULT_SCALE_FACTOR, Multiscale, MultiscaleOptions, ScaleCalibration, SchemaVersion,
    check_descriptor_list, check_options, write_metadata,
};
use crate::pyramid::{ArrayLevel, build_pyramid};
use crate::resample::Resampler;
use crate::storage::{StoreWriter, join_path};

/// Name prefix of level arrays: `s0`, `s1`, ...
pub const LEVEL_PREFIX: &str = "s";

/// Options for [`write_multiscale`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    #[serde(default)]
    pub version: SchemaVersion,
    /// Number of levels including the full-resolution one.
    #[serde(default = "default_n_levels")]
    pub n_levels: usize,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: u64,
    #[serde(default)]
    pub dimension_separator: DimensionSeparator,
    /// Overrides the chunk shape chosen from the axis layout.
    #[serde(default)]
    pub chunks: Option<ChunkShape>,
    #[serde(default)]
    pub calibration: Option<ScaleCalibration>,
    /// Write the levels into this sub-group (V2 only).
    #[serde(default)]
    pub group_prefix: Option<String>,
    /// Axes declared as scaled in the per-level transformations (V3 only).
    #[serde(default)]
    pub scaled_axes: Option<Vec<usize>>,
}

fn default_n_levels() -> usize {
    3
}

fn default_scale_factor() -> u64 {
    DEFAULT_SCALE_FACTOR
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            version: SchemaVersion::default(),
            n_levels: default_n_levels(),
            scale_factor: default_scale_factor(),
            dimension_separator: DimensionSeparator::default(),
            chunks: None,
            calibration: None,
            group_prefix: None,
            scaled_axes: None,
        }
    }
}

impl WriteOptions {
    fn multiscale_options(&self, name: &str) -> MultiscaleOptions {
        MultiscaleOptions {
            name: name.to_owned(),
            calibration: self.calibration.clone(),
            provenance: None,
            group_prefix: self.group_prefix.clone(),
            scale_factor: self.scale_factor,
            scaled_axes: self.scaled_axes.clone(),
        }
    }

    fn chunk_shape(&self, layout: &AxisLayout) -> crate::Result<ChunkShape> {
        match &self.chunks {
            Some(chunks) if chunks.len() != layout.len() => Err(crate::Error::InvalidChunkShape(
                format!(
                    "chunk shape {:?} has {} axes, layout {layout} has {}",
                    chunks.as_slice(),
                    chunks.len(),
                    layout.len()
                ),
            )),
            Some(chunks) => Ok(chunks.clone()),
            None => Ok(ChunkShape::for_layout(layout)),
        }
    }
}

/// Downsample `data` into a pyramid under `group` and append its descriptor.
///
/// All validation, and the whole pyramid computation, happens before the
/// store is touched. Existing arrays are never replaced: if the image root
/// already holds arrays the call fails without writing. If a store write
/// fails part way, the levels written so far remain and no descriptor is
/// appended.
pub fn write_multiscale(
    store: &dyn StoreWriter,
    group: &str,
    data: ImageData,
    layout: AxisLayout,
    name: &str,
    resampler: &dyn Resampler,
    options: &WriteOptions,
) -> crate::Result<Multiscale> {
    let version = options.version;
    let level0 = ArrayLevel::new(data, layout.clone())?;
    let mut ms_options = options.multiscale_options(name);
    check_options(version, &layout, &ms_options)?;
    let mut chunks = options.chunk_shape(&layout)?;

    let image_root = match &options.group_prefix {
        Some(prefix) => join_path(group, prefix),
        None => group.trim_matches('/').to_owned(),
    };
    check_descriptor_list(store, group)?;
    if let Some(existing) = store.list_arrays(&image_root)?.first() {
        return Err(crate::Error::ArrayExists(join_path(&image_root, existing)));
    }

    let pyramid = build_pyramid(level0, options.n_levels, resampler, options.scale_factor)?;
    ms_options.provenance = Some(pyramid.provenance.clone());

    let mut levels: Vec<ImageData> = pyramid.levels.into_iter().map(|l| l.data).collect();
    if version.expands_to_5d() {
        let present = AxisName::CANONICAL.map(|ax| layout.contains(ax));
        levels = levels.into_iter().map(|d| d.expand_to_5d(present)).collect();
        chunks = chunks.expand_to_5d(&layout);
    }

    store.create_group(group)?;
    store.create_group(&image_root)?;
    for (lvl, data) in levels.iter().enumerate() {
        let path = join_path(&image_root, &format!("{LEVEL_PREFIX}{lvl}"));
        let handle = store.create_array(
            &path,
            &data.shape_u64(),
            data.data_type(),
            &chunks,
            options.dimension_separator,
        )?;
        store.write_array(&handle, data)?;
    }
    info!(
        "wrote {} levels of {name:?} ({layout}) to {image_root:?}",
        levels.len()
    );

    write_metadata(store, group, version, &layout, &ms_options)
}
