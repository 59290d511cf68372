//! Resampling of purely spatial arrays.
//!
//! The pyramid owns the axis-aware dispatch; a [`Resampler`] only ever sees
//! arrays whose every axis is spatial.

use ndarray::{ArrayD, ArrayViewD, IxDyn, Slice};
use serde::{Deserialize, Serialize};

use crate::data::{Element, ImageData, with_image_data};

/// Parameters passed to a [`Resampler`] for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleParams {
    /// Integer downsampling factor for each axis of the array passed in.
    pub factors: Vec<u64>,
    /// Keep the input element type and value range.
    #[serde(default = "default_preserve_range")]
    pub preserve_range: bool,
}

fn default_preserve_range() -> bool {
    true
}

impl ResampleParams {
    pub fn uniform(ndim: usize, factor: u64) -> Self {
        Self {
            factors: vec![factor; ndim],
            preserve_range: default_preserve_range(),
        }
    }
}

/// Method name and parameters recorded in a multiscale descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub method: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Downsamples an array in which all axes are spatial.
pub trait Resampler: Send + Sync {
    /// Name written as the descriptor's `type`.
    fn name(&self) -> String;

    fn resample(&self, data: &ImageData, params: &ResampleParams) -> crate::Result<ImageData>;

    /// Parameters written into the descriptor's `metadata`.
    fn parameters(&self, params: &ResampleParams) -> serde_json::Value {
        let scale: Vec<f64> = params.factors.iter().map(|&f| 1.0 / f as f64).collect();
        serde_json::json!({
            "scale": scale,
            "preserve_range": params.preserve_range,
        })
    }

    fn provenance(&self, params: &ResampleParams) -> Provenance {
        Provenance {
            method: self.name(),
            parameters: self.parameters(params),
        }
    }
}

fn check_factors(data: &ImageData, params: &ResampleParams) -> crate::Result<()> {
    if params.factors.len() != data.ndim() {
        return Err(crate::Error::DimensionMismatch {
            expected: params.factors.len(),
            found: data.ndim(),
        });
    }
    if params.factors.contains(&0) {
        return Err(crate::Error::InvalidOptions(
            "resampling factors must be positive".into(),
        ));
    }
    Ok(())
}

/// Order-0 resampling: keeps every `f`-th element along each axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nearest;

fn nearest<T: Element>(array: &ArrayD<T>, factors: &[u64]) -> ArrayD<T> {
    array
        .slice_each_axis(|ad| Slice::new(0, None, factors[ad.axis.index()] as isize))
        .to_owned()
}

impl Resampler for Nearest {
    fn name(&self) -> String {
        "nearest".into()
    }

    fn resample(&self, data: &ImageData, params: &ResampleParams) -> crate::Result<ImageData> {
        check_factors(data, params)?;
        Ok(with_image_data!(data, a => nearest(a, &params.factors).into()))
    }

    fn parameters(&self, params: &ResampleParams) -> serde_json::Value {
        let scale: Vec<f64> = params.factors.iter().map(|&f| 1.0 / f as f64).collect();
        serde_json::json!({
            "scale": scale,
            "order": 0,
            "preserve_range": params.preserve_range,
        })
    }
}

/// Block-mean resampling.
///
/// Edge blocks that are cut short by the array bounds average only the
/// elements they contain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMean;

fn block_means<T: Element>(array: &ArrayD<T>, factors: &[u64]) -> ArrayD<f64> {
    let view: ArrayViewD<'_, T> = array.view();
    let out_shape: Vec<usize> = array
        .shape()
        .iter()
        .zip(factors)
        .map(|(&n, &f)| n.div_ceil(f as usize))
        .collect();
    ArrayD::from_shape_fn(IxDyn(&out_shape), |idx| {
        let block = view.slice_each_axis(|ad| {
            let dim = ad.axis.index();
            let f = factors[dim] as usize;
            let start = idx[dim] * f;
            let end = (start + f).min(ad.len);
            Slice::from(start..end)
        });
        let mut sum = 0.0;
        let mut count = 0usize;
        for v in block.iter() {
            sum += v.to_f64().unwrap_or(0.0);
            count += 1;
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    })
}

fn local_mean<T: Element>(array: &ArrayD<T>, params: &ResampleParams) -> ImageData {
    let means = block_means(array, &params.factors);
    if !params.preserve_range {
        return means.into();
    }
    let cast = means.mapv(|m| {
        let m = if T::DATA_TYPE.is_float() { m } else { m.round() };
        <T as num_traits::NumCast>::from(m).unwrap_or_default()
    });
    T::into_image_data(cast)
}

impl Resampler for LocalMean {
    fn name(&self) -> String {
        "local_mean".into()
    }

    fn resample(&self, data: &ImageData, params: &ResampleParams) -> crate::Result<ImageData> {
        check_factors(data, params)?;
        Ok(with_image_data!(data, a => local_mean(a, params)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataType;

    fn ramp(shape: &[usize]) -> ImageData {
        let n: usize = shape.iter().product();
        ArrayD::from_shape_vec(IxDyn(shape), (0..n as u16).collect())
            .unwrap()
            .into()
    }

    #[test]
    fn nearest_takes_every_other_element() {
        let data = ramp(&[4, 5]);
        let out = Nearest
            .resample(&data, &ResampleParams::uniform(2, 2))
            .unwrap();
        assert_eq!(out.shape(), &[2, 3]);
        let values = u16::from_image_data(out).unwrap();
        assert_eq!(
            values.iter().copied().collect::<Vec<_>>(),
            vec![0, 2, 4, 10, 12, 14]
        );
    }

    #[test]
    fn local_mean_preserves_type() {
        let data = ramp(&[2, 4]);
        let out = LocalMean
            .resample(&data, &ResampleParams::uniform(2, 2))
            .unwrap();
        assert_eq!(out.data_type(), DataType::UInt16);
        let values = u16::from_image_data(out).unwrap();
        // blocks: {0,1,4,5} -> 2.5, {2,3,6,7} -> 4.5; rounded half away from zero
        assert_eq!(values.iter().copied().collect::<Vec<_>>(), vec![3, 5]);
    }

    #[test]
    fn local_mean_edge_blocks_average_present_elements() {
        let data: ImageData = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0f32, 3.0, 10.0])
            .unwrap()
            .into();
        let out = LocalMean
            .resample(&data, &ResampleParams::uniform(1, 2))
            .unwrap();
        let values = f32::from_image_data(out).unwrap();
        assert_eq!(values.iter().copied().collect::<Vec<_>>(), vec![2.0, 10.0]);
    }

    #[test]
    fn local_mean_without_range_preservation_is_float() {
        let data = ramp(&[2, 2]);
        let params = ResampleParams {
            factors: vec![2, 2],
            preserve_range: false,
        };
        let out = LocalMean.resample(&data, &params).unwrap();
        assert_eq!(out.data_type(), DataType::Float64);
    }

    #[test]
    fn rejects_wrong_factor_count() {
        let data = ramp(&[2, 2]);
        assert!(matches!(
            Nearest.resample(&data, &ResampleParams::uniform(3, 2)),
            Err(crate::Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn provenance_records_method() {
        let p = Nearest.provenance(&ResampleParams::uniform(3, 2));
        assert_eq!(p.method, "nearest");
        assert_eq!(p.parameters["order"], 0);
        assert_eq!(p.parameters["scale"], serde_json::json!([0.5, 0.5, 0.5]));
    }
}
