//! Label images (segmentations) stored next to the image they annotate.
//!
//! Layout inside an image group:
//!
//! ```text
//! <image>/labels/.zattrs            {"labels": ["cells", "nuclei"]}
//! <image>/labels/<name>/.zattrs     {"multiscales": [...], "image-label": {...}}
//! <image>/labels/<name>/s0, s1, ...
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::axis::AxisLayout;
use crate::data::ImageData;
use crate::metadata::Multiscale;
use crate::resample::Resampler;
use crate::storage::{StoreWriter, join_path};
use crate::writer::{WriteOptions, write_multiscale};

pub const LABELS_GROUP: &str = "labels";
pub const LABELS_KEY: &str = "labels";
pub const IMAGE_LABEL_KEY: &str = "image-label";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelColor {
    #[serde(rename = "label-value")]
    pub label_value: u64,
    pub rgba: [u8; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSource {
    /// Path from the label group to the image group.
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLabel {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<LabelColor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<LabelSource>,
}

fn check_label_name(name: &str) -> crate::Result<()> {
    if name.is_empty() || name.contains('/') || name.starts_with('.') {
        return Err(crate::Error::InvalidOptions(format!(
            "invalid label name {name:?}"
        )));
    }
    Ok(())
}

fn check_colors(colors: &[LabelColor]) -> crate::Result<()> {
    let mut seen = HashSet::new();
    for color in colors {
        if !seen.insert(color.label_value) {
            return Err(crate::Error::InvalidOptions(format!(
                "duplicate label value {} in colors",
                color.label_value
            )));
        }
    }
    Ok(())
}

/// Fail if the `labels` list of `labels_group` is malformed or already names `label_name`.
fn check_unregistered(
    store: &dyn StoreWriter,
    labels_group: &str,
    label_name: &str,
) -> crate::Result<()> {
    match store.attributes(labels_group)?.get(LABELS_KEY) {
        None => Ok(()),
        Some(Value::Array(names)) if names.iter().any(|n| n.as_str() == Some(label_name)) => {
            Err(crate::Error::InvalidOptions(format!(
                "label {label_name:?} already exists in {labels_group:?}"
            )))
        }
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(crate::Error::invalid_attributes(
            labels_group,
            format!("`{LABELS_KEY}` is not a list"),
        )),
    }
}

/// Write a label pyramid for the image at `image_group` and register it.
///
/// Label data must have an integer element type. An existing label is never
/// rewritten.
#[allow(clippy::too_many_arguments)]
pub fn write_label_multiscale(
    store: &dyn StoreWriter,
    image_group: &str,
    label_name: &str,
    data: ImageData,
    layout: AxisLayout,
    resampler: &dyn Resampler,
    options: &WriteOptions,
    colors: Option<Vec<LabelColor>>,
) -> crate::Result<Multiscale> {
    check_label_name(label_name)?;
    if data.data_type().is_float() {
        return Err(crate::Error::InvalidOptions(format!(
            "label data must be integer, got {:?}",
            data.data_type()
        )));
    }
    if options.group_prefix.is_some() {
        return Err(crate::Error::InvalidOptions(
            "label images cannot use a group prefix".into(),
        ));
    }
    if let Some(colors) = &colors {
        check_colors(colors)?;
    }

    let labels_group = join_path(image_group, LABELS_GROUP);
    let label_group = join_path(&labels_group, label_name);
    check_unregistered(store, &labels_group, label_name)?;
    let descriptor = write_multiscale(
        store,
        &label_group,
        data,
        layout,
        label_name,
        resampler,
        options,
    )?;

    let image_label = serde_json::to_value(ImageLabel {
        version: options.version.as_str().to_owned(),
        colors,
        source: Some(LabelSource {
            image: "../../".into(),
        }),
    })?;
    store.update_attributes(&label_group, &mut |attributes: &mut Map<String, Value>| {
        attributes.insert(IMAGE_LABEL_KEY.into(), image_label.clone());
        Ok(())
    })?;

    store.update_attributes(&labels_group, &mut |attributes: &mut Map<String, Value>| {
        let entry = attributes
            .entry(LABELS_KEY)
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(names) = entry else {
            return Err(crate::Error::invalid_attributes(
                &labels_group,
                format!("`{LABELS_KEY}` is not a list"),
            ));
        };
        if !names.iter().any(|n| n.as_str() == Some(label_name)) {
            names.push(Value::from(label_name));
        }
        Ok(())
    })?;
    Ok(descriptor)
}

/// Names of the label images registered for `image_group`.
pub fn label_names(store: &dyn StoreWriter, image_group: &str) -> crate::Result<Vec<String>> {
    let labels_group = join_path(image_group, LABELS_GROUP);
    let mut attributes = store.attributes(&labels_group)?;
    match attributes.remove(LABELS_KEY) {
        None => Ok(Vec::new()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use zarrs::storage::store::MemoryStore;

    use super::*;
    use crate::storage::ZarrStore;

    #[test]
    fn image_label_json() {
        let label = ImageLabel {
            version: "0.4".into(),
            colors: Some(vec![LabelColor {
                label_value: 1,
                rgba: [0, 0, 255, 255],
            }]),
            source: Some(LabelSource {
                image: "../../".into(),
            }),
        };
        assert_eq!(
            serde_json::to_value(&label).unwrap(),
            serde_json::json!({
                "version": "0.4",
                "colors": [{"label-value": 1, "rgba": [0, 0, 255, 255]}],
                "source": {"image": "../../"}
            })
        );
    }

    #[test]
    fn duplicate_colors_rejected() {
        let color = LabelColor {
            label_value: 3,
            rgba: [1, 2, 3, 4],
        };
        assert!(check_colors(&[color.clone(), color]).is_err());
    }

    #[test]
    fn registered_label_is_not_rewritten() {
        let store = ZarrStore::new(Arc::new(MemoryStore::new()));
        assert!(check_unregistered(&store, "img/labels", "cells").is_ok());
        let mut attributes = Map::new();
        attributes.insert(LABELS_KEY.into(), serde_json::json!(["cells"]));
        store.set_attributes("img/labels", attributes).unwrap();
        assert!(matches!(
            check_unregistered(&store, "img/labels", "cells"),
            Err(crate::Error::InvalidOptions(_))
        ));
        assert!(check_unregistered(&store, "img/labels", "nuclei").is_ok());

        let mut attributes = Map::new();
        attributes.insert(LABELS_KEY.into(), serde_json::json!({"cells": 1}));
        store.set_attributes("img/labels", attributes).unwrap();
        assert!(matches!(
            check_unregistered(&store, "img/labels", "nuclei"),
            Err(crate::Error::InvalidAttributes { .. })
        ));
    }

    #[test]
    fn label_names_validated() {
        assert!(check_label_name("cells").is_ok());
        assert!(check_label_name("").is_err());
        assert!(check_label_name("a/b").is_err());
    }
}
