//! Multiscale OME-NGFF image pyramids written to Zarr stores.
//!
//! An array with a validated [`AxisLayout`] is downsampled along its spatial
//! axes only, every level is written with one shared chunk shape, and a
//! versioned `multiscales` descriptor is appended to the group attributes.

pub mod axis;
pub mod chunk;
pub mod chunk_key_encoding;
pub mod data;
mod error;
pub mod labels;
pub mod metadata;
pub mod pyramid;
pub mod resample;
pub mod storage;
pub mod writer;

pub use zarrs;

pub use axis::{AxisKind, AxisLayout, AxisName};
pub use chunk::{ChunkShape, choose_chunk_shape};
pub use chunk_key_encoding::DimensionSeparator;
pub use data::{DataType, Element, ImageData};
pub use error::{Error, Result};
pub use metadata::{
    Multiscale, MultiscaleOptions, ScaleCalibration, ScaleValue, SchemaVersion, TimeCalibration,
    append_descriptor, emit,
};
pub use pyramid::{ArrayLevel, Pyramid, build_pyramid};
pub use resample::{LocalMean, Nearest, Provenance, ResampleParams, Resampler};
pub use storage::{LevelHandle, StoreWriter, ZarrStore};
pub use writer::{WriteOptions, write_multiscale};
