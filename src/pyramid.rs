//! Multiscale pyramid construction.
//!
//! Level `i + 1` is computed from level `i` by resampling the spatial axes
//! only. Leading channel and time axes are split off, every spatial slice is
//! resampled independently, and the results are stacked back in the original
//! order.

use log::debug;
use ndarray::{ArrayD, ArrayViewD, Axis, Dimension, IxDyn};

use crate::axis::AxisLayout;
use crate::data::{Element, ImageData, with_image_data};
use crate::resample::{Provenance, ResampleParams, Resampler};

/// Highest index at which the spatial block may start.
const MAX_SPATIAL_START: usize = 2;

/// One resolution level and the layout it was produced under.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLevel {
    pub data: ImageData,
    pub layout: AxisLayout,
}

impl ArrayLevel {
    pub fn new(data: ImageData, layout: AxisLayout) -> crate::Result<Self> {
        if data.ndim() != layout.len() {
            return Err(crate::Error::DimensionMismatch {
                expected: layout.len(),
                found: data.ndim(),
            });
        }
        Ok(Self { data, layout })
    }
}

/// The levels of a pyramid, finest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    pub levels: Vec<ArrayLevel>,
    /// Per-level downsampling factor applied to every spatial axis.
    pub scale_factor: u64,
    pub provenance: Provenance,
}

/// Split a layout into its leading non-spatial prefix length.
///
/// The remaining axes must all be spatial.
pub fn spatial_start(layout: &AxisLayout) -> crate::Result<usize> {
    let start = layout
        .iter()
        .position(|a| a.is_spatial())
        .ok_or_else(|| crate::Error::UnsupportedLayout(format!("{layout} has no spatial axes")))?;
    if start > MAX_SPATIAL_START {
        return Err(crate::Error::UnsupportedLayout(format!(
            "spatial axes of {layout} start at index {start}"
        )));
    }
    if !layout.iter().skip(start).all(|a| a.is_spatial()) {
        return Err(crate::Error::UnsupportedLayout(format!(
            "spatial axes of {layout} are not a trailing block"
        )));
    }
    Ok(start)
}

/// Build `n_levels` levels, level 0 being `level0` unchanged.
///
/// Every level is computed in memory; nothing is written.
pub fn build_pyramid(
    level0: ArrayLevel,
    n_levels: usize,
    resampler: &dyn Resampler,
    scale_factor: u64,
) -> crate::Result<Pyramid> {
    if n_levels == 0 {
        return Err(crate::Error::InvalidOptions(
            "a pyramid needs at least one level".into(),
        ));
    }
    if scale_factor < 2 {
        return Err(crate::Error::InvalidOptions(format!(
            "scale factor must be at least 2, got {scale_factor}"
        )));
    }
    let layout = level0.layout.clone();
    if level0.data.ndim() != layout.len() {
        return Err(crate::Error::DimensionMismatch {
            expected: layout.len(),
            found: level0.data.ndim(),
        });
    }
    let start = spatial_start(&layout)?;
    let params = ResampleParams::uniform(layout.len() - start, scale_factor);
    let provenance = resampler.provenance(&params);

    let mut levels = Vec::with_capacity(n_levels);
    levels.push(level0);
    for lvl in 1..n_levels {
        let prev = &levels[lvl - 1];
        let data = downscale(&prev.data, start, resampler, &params)?;
        check_extents(&layout, start, prev.data.shape(), data.shape(), scale_factor)?;
        debug!("built level {lvl} with shape {:?}", data.shape());
        levels.push(ArrayLevel {
            data,
            layout: layout.clone(),
        });
    }
    Ok(Pyramid {
        levels,
        scale_factor,
        provenance,
    })
}

/// Resample one level, leaving the first `start` axes untouched.
pub(crate) fn downscale(
    data: &ImageData,
    start: usize,
    resampler: &dyn Resampler,
    params: &ResampleParams,
) -> crate::Result<ImageData> {
    let expected = data.data_type();
    let out = if start == 0 {
        resampler.resample(data, params)?
    } else {
        with_image_data!(data, a => downscale_slices(a, start, resampler, params)?)
    };
    if out.data_type() != expected {
        return Err(crate::Error::DtypeDrift {
            expected,
            found: out.data_type(),
        });
    }
    Ok(out)
}

fn downscale_slices<T: Element>(
    array: &ArrayD<T>,
    start: usize,
    resampler: &dyn Resampler,
    params: &ResampleParams,
) -> crate::Result<ImageData> {
    let spatial_shape = &array.shape()[start..];

    let mut slices: Vec<ArrayD<T>> = Vec::new();
    for index in ndarray::indices(&array.shape()[..start]) {
        let mut view: ArrayViewD<'_, T> = array.view();
        for &i in index.slice() {
            view = view.index_axis_move(Axis(0), i);
        }
        let resampled = resampler.resample(&T::into_image_data(view.to_owned()), params)?;
        let slice = T::from_image_data(resampled).map_err(|other| crate::Error::DtypeDrift {
            expected: T::DATA_TYPE,
            found: other.data_type(),
        })?;
        if let Some(first) = slices.first() {
            if first.shape() != slice.shape() {
                return Err(crate::Error::general(format!(
                    "resampler returned slices of differing shapes {:?} and {:?}",
                    first.shape(),
                    slice.shape()
                )));
            }
        }
        slices.push(slice);
    }

    let out_spatial: Vec<usize> = match slices.first() {
        Some(first) => first.shape().to_vec(),
        // no slices to resample; fall back to the ceil convention
        None => spatial_shape
            .iter()
            .zip(&params.factors)
            .map(|(&n, &f)| n.div_ceil(f as usize))
            .collect(),
    };
    let mut out_shape: Vec<usize> = array.shape()[..start].to_vec();
    out_shape.extend_from_slice(&out_spatial);

    let mut flat: Vec<T> = Vec::with_capacity(out_shape.iter().product());
    for slice in &slices {
        flat.extend(slice.iter().copied());
    }
    let stacked = ArrayD::from_shape_vec(IxDyn(&out_shape), flat).map_err(crate::Error::wrap)?;
    Ok(T::into_image_data(stacked))
}

fn check_extents(
    layout: &AxisLayout,
    start: usize,
    input: &[usize],
    output: &[usize],
    factor: u64,
) -> crate::Result<()> {
    if input.len() != output.len() {
        return Err(crate::Error::DimensionMismatch {
            expected: input.len(),
            found: output.len(),
        });
    }
    for (idx, axis) in layout.iter().enumerate() {
        let (n_in, n_out) = (input[idx] as u64, output[idx] as u64);
        let ok = if idx < start {
            n_in == n_out
        } else {
            n_out == n_in.div_ceil(factor) || n_out == n_in / factor
        };
        if !ok {
            return Err(crate::Error::ScaleFactorMismatch {
                axis,
                input: n_in,
                output: n_out,
                factor,
            });
        }
    }
    Ok(())
}
