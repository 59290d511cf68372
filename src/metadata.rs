//! OME-NGFF multiscale descriptors.
//!
//! One [`emit`] builds the descriptor for every [`SchemaVersion`]; the
//! versions differ only in a few explicit branches:
//!
//! - [`SchemaVersion::V1`] (`0.2`): dataset paths only, calibration carried
//!   informally in `metadata`.
//! - [`SchemaVersion::V2`] (`0.4`): `axes` objects, one `coordinateTransformations`
//!   scale per dataset, optional group prefix and a separate top-level time scale.
//! - [`SchemaVersion::V3`] (`0.3`): `axes` objects, per-dataset `transformations`
//!   that scale only the listed `axisIndices`. No group prefix, no time scale.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::axis::{AxisKind, AxisLayout, AxisName};
use crate::resample::Provenance;
use crate::storage::{LevelHandle, StoreWriter, join_path};

/// Attribute key holding the list of descriptors.
pub const MULTISCALES_KEY: &str = "multiscales";
/// Per-level attribute naming the dimensions, as used by xarray.
pub const ARRAY_DIMENSIONS_KEY: &str = "_ARRAY_DIMENSIONS";
pub const DEFAULT_SCALE_FACTOR: u64 = 2;

/// Metadata schema variant, (de)serialised as its version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "0.2")]
    V1,
    #[default]
    #[serde(rename = "0.4")]
    V2,
    #[serde(rename = "0.3")]
    V3,
}

impl SchemaVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::V1 => "0.2",
            SchemaVersion::V2 => "0.4",
            SchemaVersion::V3 => "0.3",
        }
    }

    pub fn supports_group_prefix(self) -> bool {
        matches!(self, SchemaVersion::V2)
    }

    pub fn has_axes(self) -> bool {
        !matches!(self, SchemaVersion::V1)
    }

    /// Whether levels are stored expanded to `(t, c, z, y, x)`.
    pub fn expands_to_5d(self) -> bool {
        matches!(self, SchemaVersion::V1)
    }

    fn unsupported(self, feature: &'static str) -> crate::Error {
        crate::Error::UnsupportedBySchema {
            version: self.as_str(),
            feature,
        }
    }
}

/// Calibration of the time axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeCalibration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Physical size of a voxel along each spatial axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaleCalibration {
    pub voxel_size: BTreeMap<AxisName, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeCalibration>,
}

impl ScaleCalibration {
    pub fn new(voxel_size: impl IntoIterator<Item = (AxisName, f64)>) -> Self {
        Self {
            voxel_size: voxel_size.into_iter().collect(),
            unit: None,
            time: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_time(mut self, scale: Option<f64>, unit: Option<String>) -> Self {
        self.time = Some(TimeCalibration { scale, unit });
        self
    }

    pub fn time_scale(&self) -> Option<f64> {
        self.time.as_ref().and_then(|t| t.scale)
    }

    /// The voxel size keys must be exactly the spatial axes of `layout`.
    pub fn validate(&self, layout: &AxisLayout) -> crate::Result<()> {
        let mut expected = layout.spatial_axes();
        expected.sort();
        let found: Vec<AxisName> = self.voxel_size.keys().copied().collect();
        if expected != found {
            return Err(crate::Error::CalibrationAxisMismatch { expected, found });
        }
        for (axis, size) in &self.voxel_size {
            if !size.is_finite() || *size <= 0.0 {
                return Err(crate::Error::InvalidCalibration(format!(
                    "voxel size {size} for axis {axis} is not positive"
                )));
            }
        }
        if let Some(time) = &self.time {
            if !layout.contains(AxisName::T) {
                return Err(crate::Error::InvalidCalibration(format!(
                    "time calibration given for layout {layout} without a time axis"
                )));
            }
            if let Some(scale) = time.scale {
                if !scale.is_finite() || scale <= 0.0 {
                    return Err(crate::Error::InvalidCalibration(format!(
                        "time scale {scale} is not positive"
                    )));
                }
            }
        }
        Ok(())
    }

    fn voxel(&self, axis: AxisName) -> f64 {
        self.voxel_size.get(&axis).copied().unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisMetadata {
    pub name: AxisName,
    #[serde(rename = "type")]
    pub kind: AxisKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One entry of a scale vector.
///
/// Non-spatial axes get the integer `1`; physical scales are floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScaleValue {
    Integer(u64),
    Float(f64),
}

impl ScaleValue {
    pub const IDENTITY: ScaleValue = ScaleValue::Integer(1);

    pub fn as_f64(self) -> f64 {
        match self {
            ScaleValue::Integer(n) => n as f64,
            ScaleValue::Float(f) => f,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CoordinateTransformation {
    Scale {
        scale: Vec<ScaleValue>,
        #[serde(
            rename = "axisIndices",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        axis_indices: Option<Vec<usize>>,
    },
}

impl CoordinateTransformation {
    pub fn scale(&self) -> Vec<f64> {
        let CoordinateTransformation::Scale { scale, .. } = self;
        scale.iter().map(|v| v.as_f64()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub path: String,
    #[serde(
        rename = "coordinateTransformations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub coordinate_transformations: Option<Vec<CoordinateTransformation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformations: Option<Vec<CoordinateTransformation>>,
}

/// One entry of the `multiscales` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multiscale {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<Vec<AxisMetadata>>,
    /// Ordered from highest to lowest resolution.
    pub datasets: Vec<Dataset>,
    pub name: String,
    pub version: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Applied after the per-dataset transformations.
    #[serde(
        rename = "coordinateTransformations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub coordinate_transformations: Option<Vec<CoordinateTransformation>>,
}

/// Inputs to [`emit`] besides the levels and layout.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiscaleOptions {
    pub name: String,
    pub calibration: Option<ScaleCalibration>,
    pub provenance: Option<Provenance>,
    /// Sub-group holding the levels, relative to the group carrying the attributes.
    pub group_prefix: Option<String>,
    /// Downsampling factor between consecutive levels. Must match the pyramid.
    pub scale_factor: u64,
    /// Axes scaled by the per-level transformations (V3 only).
    pub scaled_axes: Option<Vec<usize>>,
}

impl MultiscaleOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calibration: None,
            provenance: None,
            group_prefix: None,
            scale_factor: DEFAULT_SCALE_FACTOR,
            scaled_axes: None,
        }
    }

    pub fn with_calibration(mut self, calibration: ScaleCalibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn with_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_prefix = Some(prefix.into());
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: u64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_scaled_axes(mut self, axes: Vec<usize>) -> Self {
        self.scaled_axes = Some(axes);
        self
    }
}

/// Check that `options` can be expressed in `version` for `layout`.
///
/// Runs before anything is written.
pub fn check_options(
    version: SchemaVersion,
    layout: &AxisLayout,
    options: &MultiscaleOptions,
) -> crate::Result<()> {
    if options.scale_factor < 2 {
        return Err(crate::Error::InvalidOptions(format!(
            "scale factor must be at least 2, got {}",
            options.scale_factor
        )));
    }
    if let Some(calibration) = &options.calibration {
        calibration.validate(layout)?;
        if calibration.time_scale().is_some() && version == SchemaVersion::V3 {
            return Err(version.unsupported("a separate time scale"));
        }
    }
    if let Some(prefix) = &options.group_prefix {
        if !version.supports_group_prefix() {
            return Err(version.unsupported("grouped image prefixes"));
        }
        if prefix.trim_matches('/').is_empty() {
            return Err(crate::Error::InvalidOptions("empty group prefix".into()));
        }
    }
    if options.scaled_axes.is_some() && version != SchemaVersion::V3 {
        return Err(version.unsupported("explicit scaled axis indices"));
    }
    scaled_axis_indices(layout, options)?;
    Ok(())
}

fn scaled_axis_indices(layout: &AxisLayout, options: &MultiscaleOptions) -> crate::Result<Vec<usize>> {
    let Some(indices) = &options.scaled_axes else {
        return Ok(layout.spatial_indices());
    };
    if indices.is_empty() {
        return Err(crate::Error::InvalidOptions("no scaled axes given".into()));
    }
    for (pos, &idx) in indices.iter().enumerate() {
        let axis = layout.axes().get(idx).ok_or_else(|| {
            crate::Error::InvalidOptions(format!("axis index {idx} out of range for {layout}"))
        })?;
        if !axis.is_spatial() {
            return Err(crate::Error::InvalidOptions(format!(
                "axis index {idx} ({axis}) is not spatial"
            )));
        }
        if pos > 0 && indices[pos - 1] >= idx {
            return Err(crate::Error::InvalidOptions(format!(
                "scaled axis indices {indices:?} must be strictly increasing"
            )));
        }
    }
    Ok(indices.clone())
}

fn axis_unit(axis: AxisName, calibration: Option<&ScaleCalibration>) -> Option<String> {
    let calibration = calibration?;
    match axis.kind() {
        AxisKind::Space => calibration.unit.clone(),
        AxisKind::Time => calibration.time.as_ref().and_then(|t| t.unit.clone()),
        AxisKind::Channel => None,
    }
}

fn axes_metadata(layout: &AxisLayout, calibration: Option<&ScaleCalibration>) -> Vec<AxisMetadata> {
    layout
        .iter()
        .map(|axis| {
            let unit = axis_unit(axis, calibration);
            if unit.is_none() && axis.kind() != AxisKind::Channel {
                debug!("no unit for axis {axis}");
            }
            AxisMetadata {
                name: axis,
                kind: axis.kind(),
                unit,
            }
        })
        .collect()
}

/// Physical scale of `axis` at `level`; 1 for non-spatial axes.
fn axis_scale(
    axis: AxisName,
    level: usize,
    calibration: Option<&ScaleCalibration>,
    scale_factor: u64,
) -> ScaleValue {
    if !axis.is_spatial() {
        return ScaleValue::IDENTITY;
    }
    let base = calibration.map_or(1.0, |c| c.voxel(axis));
    ScaleValue::Float(base * (scale_factor as f64).powi(level as i32))
}

fn dataset_path(prefix: Option<&str>, level_name: &str) -> String {
    match prefix {
        Some(p) => format!("{}/{level_name}", p.trim_matches('/')),
        None => level_name.to_owned(),
    }
}

fn flat_metadata(
    provenance: Option<&Provenance>,
    calibration: Option<&ScaleCalibration>,
) -> crate::Result<Option<Value>> {
    let mut metadata = provenance
        .map(|p| p.parameters.clone())
        .filter(|v| !v.is_null());
    if let Some(calibration) = calibration {
        let calibration = serde_json::to_value(calibration)?;
        metadata = Some(match metadata {
            Some(Value::Object(mut map)) => {
                map.insert("calibration".into(), calibration);
                Value::Object(map)
            }
            Some(other) => serde_json::json!({ "parameters": other, "calibration": calibration }),
            None => serde_json::json!({ "calibration": calibration }),
        });
    }
    Ok(metadata)
}

/// Build the descriptor for `levels`, which are ordered finest first.
pub fn emit(
    version: SchemaVersion,
    levels: &[LevelHandle],
    layout: &AxisLayout,
    options: &MultiscaleOptions,
) -> crate::Result<Multiscale> {
    check_options(version, layout, options)?;
    let expected_ndim = if version.expands_to_5d() { 5 } else { layout.len() };
    for level in levels {
        if level.shape.len() != expected_ndim {
            return Err(crate::Error::DimensionMismatch {
                expected: expected_ndim,
                found: level.shape.len(),
            });
        }
    }
    let calibration = options.calibration.as_ref();
    let prefix = options.group_prefix.as_deref();
    let factor = options.scale_factor;

    let mut datasets: Vec<Dataset> = levels
        .iter()
        .map(|level| Dataset {
            path: dataset_path(prefix, &level.name),
            coordinate_transformations: None,
            transformations: None,
        })
        .collect();

    let mut multiscale = Multiscale {
        axes: None,
        datasets: Vec::new(),
        name: options.name.clone(),
        version: version.as_str().to_owned(),
        method: options.provenance.as_ref().map(|p| p.method.clone()),
        metadata: options
            .provenance
            .as_ref()
            .map(|p| p.parameters.clone())
            .filter(|v| !v.is_null()),
        coordinate_transformations: None,
    };
    if version.has_axes() {
        multiscale.axes = Some(axes_metadata(layout, calibration));
    }

    match version {
        SchemaVersion::V1 => {
            multiscale.metadata = flat_metadata(options.provenance.as_ref(), calibration)?;
        }
        SchemaVersion::V2 => {
            for (lvl, dataset) in datasets.iter_mut().enumerate() {
                let scale = layout
                    .iter()
                    .map(|axis| axis_scale(axis, lvl, calibration, factor))
                    .collect();
                dataset.coordinate_transformations = Some(vec![CoordinateTransformation::Scale {
                    scale,
                    axis_indices: None,
                }]);
            }
            if let Some(time_scale) = calibration.and_then(|c| c.time_scale()) {
                let scale = layout
                    .iter()
                    .map(|axis| {
                        if axis == AxisName::T {
                            ScaleValue::Float(time_scale)
                        } else {
                            ScaleValue::IDENTITY
                        }
                    })
                    .collect();
                multiscale.coordinate_transformations = Some(vec![CoordinateTransformation::Scale {
                    scale,
                    axis_indices: None,
                }]);
            }
        }
        SchemaVersion::V3 => {
            let indices = scaled_axis_indices(layout, options)?;
            for (lvl, dataset) in datasets.iter_mut().enumerate() {
                let scale = indices
                    .iter()
                    .map(|&idx| axis_scale(layout.axes()[idx], lvl, calibration, factor))
                    .collect();
                dataset.transformations = Some(vec![CoordinateTransformation::Scale {
                    scale,
                    axis_indices: Some(indices.clone()),
                }]);
            }
        }
    }
    multiscale.datasets = datasets;
    Ok(multiscale)
}

/// Append `descriptor` to the `multiscales` list of `group`.
///
/// Existing entries are left untouched.
pub fn append_descriptor(
    store: &dyn StoreWriter,
    group: &str,
    descriptor: &Multiscale,
) -> crate::Result<()> {
    let value = serde_json::to_value(descriptor)?;
    store.update_attributes(group, &mut |attributes: &mut Map<String, Value>| {
        let entry = attributes
            .entry(MULTISCALES_KEY)
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(list) = entry else {
            return Err(crate::Error::invalid_attributes(
                group,
                format!("`{MULTISCALES_KEY}` is not a list"),
            ));
        };
        list.push(value.clone());
        Ok(())
    })
}

/// Fail unless the `multiscales` attribute of `group` is absent or a list.
///
/// Reads only, so it can run before anything is written.
pub(crate) fn check_descriptor_list(store: &dyn StoreWriter, group: &str) -> crate::Result<()> {
    match store.attributes(group)?.get(MULTISCALES_KEY) {
        None | Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(crate::Error::invalid_attributes(
            group,
            format!("`{MULTISCALES_KEY}` is not a list"),
        )),
    }
}

/// Read the descriptors stored on `group`.
pub fn read_descriptors(store: &dyn StoreWriter, group: &str) -> crate::Result<Vec<Multiscale>> {
    let mut attributes = store.attributes(group)?;
    match attributes.remove(MULTISCALES_KEY) {
        None => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

/// Describe the levels present under `group[/prefix]` and append the descriptor.
///
/// For V2 each level also gets `_ARRAY_DIMENSIONS`.
pub fn write_metadata(
    store: &dyn StoreWriter,
    group: &str,
    version: SchemaVersion,
    layout: &AxisLayout,
    options: &MultiscaleOptions,
) -> crate::Result<Multiscale> {
    check_options(version, layout, options)?;
    check_descriptor_list(store, group)?;
    let image_root = match &options.group_prefix {
        Some(prefix) => join_path(group, prefix),
        None => group.trim_matches('/').to_owned(),
    };
    let names = store.list_arrays(&image_root)?;
    if names.is_empty() {
        return Err(crate::Error::general(format!(
            "no arrays found under {image_root:?}"
        )));
    }
    let levels = names
        .iter()
        .map(|name| store.open_array(&join_path(&image_root, name)))
        .collect::<crate::Result<Vec<_>>>()?;
    let descriptor = emit(version, &levels, layout, options)?;

    if version == SchemaVersion::V2 {
        let dimensions = Value::from(layout.names());
        for level in &levels {
            store.update_attributes(&level.path, &mut |attributes: &mut Map<String, Value>| {
                attributes.insert(ARRAY_DIMENSIONS_KEY.into(), dimensions.clone());
                Ok(())
            })?;
        }
    }
    append_descriptor(store, group, &descriptor)?;
    debug!(
        "appended {} descriptor {:?} with {} levels to {group:?}",
        version.as_str(),
        descriptor.name,
        descriptor.datasets.len()
    );
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use serde_json::{from_str, json, to_value};

    use super::*;
    use crate::chunk::ChunkShape;
    use crate::chunk_key_encoding::DimensionSeparator;
    use crate::data::DataType;

    fn levels(n: usize, shape: &[u64]) -> Vec<LevelHandle> {
        (0..n)
            .map(|i| LevelHandle {
                path: format!("s{i}"),
                name: format!("s{i}"),
                shape: shape.to_vec(),
                chunks: ChunkShape::new(vec![1; shape.len()]).unwrap(),
                data_type: DataType::UInt8,
                separator: DimensionSeparator::Slash,
            })
            .collect()
    }

    fn layout(s: &str) -> AxisLayout {
        AxisLayout::parse(s).unwrap()
    }

    fn zyx_calibration() -> ScaleCalibration {
        ScaleCalibration::new([(AxisName::Z, 2.0), (AxisName::Y, 1.0), (AxisName::X, 1.0)])
            .with_unit("micrometer")
    }

    #[test]
    fn v1_flat_descriptor() {
        let ms = emit(
            SchemaVersion::V1,
            &levels(3, &[1, 1, 1, 8, 8]),
            &layout("yx"),
            &MultiscaleOptions::new("yx"),
        )
        .unwrap();
        assert_eq!(
            to_value(&ms).unwrap(),
            json!({
                "name": "yx",
                "version": "0.2",
                "datasets": [{"path": "s0"}, {"path": "s1"}, {"path": "s2"}]
            })
        );
    }

    #[test]
    fn v1_carries_calibration_in_metadata() {
        let provenance = Provenance {
            method: "nearest".into(),
            parameters: json!({"order": 0}),
        };
        let options = MultiscaleOptions::new("zyx")
            .with_calibration(zyx_calibration())
            .with_provenance(provenance);
        let ms = emit(SchemaVersion::V1, &levels(2, &[1, 1, 4, 4, 4]), &layout("zyx"), &options)
            .unwrap();
        assert_eq!(ms.method.as_deref(), Some("nearest"));
        let metadata = ms.metadata.unwrap();
        assert_eq!(metadata["order"], 0);
        assert_eq!(metadata["calibration"]["voxel_size"]["z"], 2.0);
        assert_eq!(metadata["calibration"]["unit"], "micrometer");
        assert!(ms.axes.is_none());
    }

    #[test]
    fn v2_round_trip_scales() {
        let options = MultiscaleOptions::new("img").with_calibration(zyx_calibration());
        let ms = emit(SchemaVersion::V2, &levels(4, &[8, 8, 8]), &layout("zyx"), &options).unwrap();
        let decoded: Multiscale = from_str(&serde_json::to_string(&ms).unwrap()).unwrap();
        assert_eq!(decoded, ms);
        assert_eq!(decoded.datasets.len(), 4);
        for (i, ds) in decoded.datasets.iter().enumerate() {
            let trafos = ds.coordinate_transformations.as_ref().unwrap();
            assert_eq!(trafos[0].scale()[0], 2.0 * 2f64.powi(i as i32));
            assert_eq!(trafos[0].scale()[2], 2f64.powi(i as i32));
        }
        let axes = decoded.axes.unwrap();
        assert_eq!(axes[0].unit.as_deref(), Some("micrometer"));
        assert_eq!(axes[0].kind, AxisKind::Space);
    }

    #[test]
    fn v3_round_trip_scales() {
        let options = MultiscaleOptions::new("img").with_calibration(zyx_calibration());
        let ms = emit(SchemaVersion::V3, &levels(3, &[8, 8, 8]), &layout("zyx"), &options).unwrap();
        let value = to_value(&ms).unwrap();
        assert_eq!(value["version"], "0.3");
        assert!(value["datasets"][0].get("coordinateTransformations").is_none());
        assert_eq!(value["datasets"][1]["transformations"][0]["axisIndices"], json!([0, 1, 2]));
        let decoded: Multiscale = serde_json::from_value(value).unwrap();
        for (i, ds) in decoded.datasets.iter().enumerate() {
            let trafos = ds.transformations.as_ref().unwrap();
            assert_eq!(trafos[0].scale()[0], 2.0 * 2f64.powi(i as i32));
        }
    }

    #[test]
    fn v2_time_scale_and_units() {
        let calibration = ScaleCalibration::new([(AxisName::Y, 0.65), (AxisName::X, 0.65)])
            .with_unit("micrometer")
            .with_time(Some(10.0), Some("second".into()));
        let options = MultiscaleOptions::new("tcyx").with_calibration(calibration);
        let ms = emit(SchemaVersion::V2, &levels(2, &[3, 2, 8, 8]), &layout("tcyx"), &options)
            .unwrap();
        let scale = ms.datasets[1].coordinate_transformations.as_ref().unwrap()[0].scale();
        assert_eq!(scale, vec![1.0, 1.0, 1.3, 1.3]);
        let top = ms.coordinate_transformations.as_ref().unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].scale(), vec![10.0, 1.0, 1.0, 1.0]);
        let value = to_value(&ms).unwrap();
        assert_eq!(value["coordinateTransformations"][0]["type"], "scale");
        assert_eq!(
            value["axes"],
            json!([
                {"name": "t", "type": "time", "unit": "second"},
                {"name": "c", "type": "channel"},
                {"name": "y", "type": "space", "unit": "micrometer"},
                {"name": "x", "type": "space", "unit": "micrometer"}
            ])
        );
    }

    #[test]
    fn v2_without_calibration_uses_unit_scale() {
        let ms = emit(
            SchemaVersion::V2,
            &levels(2, &[2, 8, 8]),
            &layout("cyx"),
            &MultiscaleOptions::new("cyx"),
        )
        .unwrap();
        let axes = ms.axes.as_ref().unwrap();
        assert!(axes.iter().all(|a| a.unit.is_none()));
        let scale = ms.datasets[1].coordinate_transformations.as_ref().unwrap()[0].scale();
        assert_eq!(scale, vec![1.0, 2.0, 2.0]);
        assert!(ms.coordinate_transformations.is_none());
    }

    #[test]
    fn identity_entries_are_integers() {
        let calibration = ScaleCalibration::new([(AxisName::Y, 0.65), (AxisName::X, 0.65)])
            .with_time(Some(10.0), None);
        let options = MultiscaleOptions::new("tcyx").with_calibration(calibration);
        let ms = emit(SchemaVersion::V2, &levels(2, &[3, 2, 8, 8]), &layout("tcyx"), &options)
            .unwrap();
        let text = serde_json::to_string(&ms).unwrap();
        assert!(text.contains(r#""scale":[1,1,1.3,1.3]"#), "{text}");
        assert!(text.contains(r#""scale":[10.0,1,1,1]"#), "{text}");

        let value = to_value(&ms).unwrap();
        assert_eq!(
            value["datasets"][0]["coordinateTransformations"][0]["scale"],
            json!([1, 1, 0.65, 0.65])
        );
        let decoded: Multiscale = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, ms);
    }

    #[test]
    fn scale_values_decode_by_form() {
        let values: Vec<ScaleValue> = from_str("[1, 2.0, 0.5]").unwrap();
        assert_eq!(
            values,
            vec![ScaleValue::Integer(1), ScaleValue::Float(2.0), ScaleValue::Float(0.5)]
        );
        assert_eq!(values[0].as_f64(), 1.0);
    }

    #[test]
    fn v2_group_prefix_paths() {
        let options = MultiscaleOptions::new("image-0").with_group_prefix("image-0");
        let ms = emit(SchemaVersion::V2, &levels(2, &[8, 8]), &layout("yx"), &options).unwrap();
        assert_eq!(ms.datasets[0].path, "image-0/s0");
        assert_eq!(ms.datasets[1].path, "image-0/s1");
    }

    #[test]
    fn unsupported_options_per_version() {
        let prefixed = MultiscaleOptions::new("a").with_group_prefix("a");
        for version in [SchemaVersion::V1, SchemaVersion::V3] {
            assert!(matches!(
                check_options(version, &layout("yx"), &prefixed),
                Err(crate::Error::UnsupportedBySchema { .. })
            ));
        }
        let timed = MultiscaleOptions::new("a").with_calibration(
            ScaleCalibration::new([(AxisName::Y, 1.0), (AxisName::X, 1.0)])
                .with_time(Some(5.0), None),
        );
        assert!(matches!(
            check_options(SchemaVersion::V3, &layout("tyx"), &timed),
            Err(crate::Error::UnsupportedBySchema { .. })
        ));
        assert!(check_options(SchemaVersion::V2, &layout("tyx"), &timed).is_ok());
        let scaled = MultiscaleOptions::new("a").with_scaled_axes(vec![1]);
        assert!(check_options(SchemaVersion::V2, &layout("yx"), &scaled).is_err());
    }

    #[test]
    fn v3_explicit_scaled_axes() {
        let options = MultiscaleOptions::new("czyx")
            .with_calibration(zyx_calibration())
            .with_scaled_axes(vec![2, 3]);
        let ms = emit(SchemaVersion::V3, &levels(2, &[2, 4, 8, 8]), &layout("czyx"), &options)
            .unwrap();
        let value = to_value(&ms).unwrap();
        assert_eq!(
            value["datasets"][1]["transformations"],
            json!([{"type": "scale", "scale": [2.0, 2.0], "axisIndices": [2, 3]}])
        );
        let bad = MultiscaleOptions::new("czyx").with_scaled_axes(vec![0, 1]);
        assert!(emit(SchemaVersion::V3, &levels(1, &[2, 4, 8, 8]), &layout("czyx"), &bad).is_err());
        let unordered = MultiscaleOptions::new("czyx").with_scaled_axes(vec![3, 2]);
        assert!(
            emit(SchemaVersion::V3, &levels(1, &[2, 4, 8, 8]), &layout("czyx"), &unordered)
                .is_err()
        );
    }

    #[test]
    fn calibration_axes_must_match() {
        let cal = ScaleCalibration::new([(AxisName::Y, 1.0), (AxisName::X, 1.0)]);
        assert!(cal.validate(&layout("cyx")).is_ok());
        assert!(matches!(
            cal.validate(&layout("zyx")),
            Err(crate::Error::CalibrationAxisMismatch { .. })
        ));
        let over = zyx_calibration();
        assert!(matches!(
            over.validate(&layout("yx")),
            Err(crate::Error::CalibrationAxisMismatch { .. })
        ));
        let negative = ScaleCalibration::new([(AxisName::Y, -1.0), (AxisName::X, 1.0)]);
        assert!(matches!(
            negative.validate(&layout("yx")),
            Err(crate::Error::InvalidCalibration(_))
        ));
        let timed = cal.clone().with_time(Some(1.0), None);
        assert!(timed.validate(&layout("cyx")).is_err());
    }

    #[test]
    fn calibration_from_json() {
        let cal: ScaleCalibration = from_str(
            r#"{"voxel_size": {"z": 1.0, "y": 0.65, "x": 0.65}, "unit": "micrometer"}"#,
        )
        .unwrap();
        assert_eq!(cal.voxel_size[&AxisName::Y], 0.65);
        assert!(cal.validate(&layout("tczyx")).is_ok());
    }

    #[test]
    fn schema_version_strings() {
        let v: SchemaVersion = from_str(r#""0.4""#).unwrap();
        assert_eq!(v, SchemaVersion::V2);
        assert_eq!(serde_json::to_string(&SchemaVersion::V3).unwrap(), r#""0.3""#);
        assert_eq!(SchemaVersion::default(), SchemaVersion::V2);
    }

    #[test]
    fn level_rank_is_checked() {
        let err = emit(
            SchemaVersion::V2,
            &levels(1, &[8, 8, 8]),
            &layout("yx"),
            &MultiscaleOptions::new("yx"),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::DimensionMismatch { expected: 2, found: 3 }));
    }
}
