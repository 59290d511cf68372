//! Axis vocabulary and the permitted axis layouts.
//!
//! Axis order is significant: `(c, y, x)` is a valid layout, `(y, x, c)` is not.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a single array dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisName {
    T,
    C,
    Z,
    Y,
    X,
}

/// Semantic class of an axis, as written into the `type` field of axis metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Time,
    Channel,
    Space,
}

impl AxisName {
    /// The full canonical order, used when expanding arrays to five dimensions.
    pub const CANONICAL: [AxisName; 5] =
        [AxisName::T, AxisName::C, AxisName::Z, AxisName::Y, AxisName::X];

    pub fn kind(self) -> AxisKind {
        match self {
            AxisName::T => AxisKind::Time,
            AxisName::C => AxisKind::Channel,
            AxisName::Z | AxisName::Y | AxisName::X => AxisKind::Space,
        }
    }

    pub fn is_spatial(self) -> bool {
        self.kind() == AxisKind::Space
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AxisName::T => "t",
            AxisName::C => "c",
            AxisName::Z => "z",
            AxisName::Y => "y",
            AxisName::X => "x",
        }
    }

    pub fn parse(name: &str) -> crate::Result<Self> {
        match name {
            "t" => Ok(AxisName::T),
            "c" => Ok(AxisName::C),
            "z" => Ok(AxisName::Z),
            "y" => Ok(AxisName::Y),
            "x" => Ok(AxisName::X),
            s => Err(crate::Error::InvalidLayout(format!("unknown axis name {s:?}"))),
        }
    }
}

impl fmt::Display for AxisName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use AxisName::{C, T, X, Y, Z};

const LAYOUTS_2D: &[&[AxisName]] = &[&[Y, X]];
const LAYOUTS_3D: &[&[AxisName]] = &[&[Z, Y, X], &[C, Y, X], &[T, Y, X]];
const LAYOUTS_4D: &[&[AxisName]] = &[&[T, Z, Y, X], &[C, Z, Y, X], &[T, C, Y, X]];
const LAYOUTS_5D: &[&[AxisName]] = &[&[T, C, Z, Y, X]];

fn permitted_layouts(ndim: usize) -> &'static [&'static [AxisName]] {
    match ndim {
        2 => LAYOUTS_2D,
        3 => LAYOUTS_3D,
        4 => LAYOUTS_4D,
        5 => LAYOUTS_5D,
        _ => &[],
    }
}

/// Check an ordered axis tuple against the permitted layouts for its length.
pub fn validate(axes: &[AxisName]) -> crate::Result<()> {
    if !(2..=5).contains(&axes.len()) {
        return Err(crate::Error::InvalidLayout(format!(
            "expected 2 to 5 axes, got {}",
            axes.len()
        )));
    }
    for (idx, ax) in axes.iter().enumerate() {
        if axes[..idx].contains(ax) {
            return Err(crate::Error::InvalidLayout(format!("duplicate axis {ax}")));
        }
    }
    if !permitted_layouts(axes.len()).contains(&axes) {
        return Err(crate::Error::InvalidLayout(format!(
            "{} is not a permitted {}-d layout",
            display_axes(axes),
            axes.len()
        )));
    }
    Ok(())
}

fn display_axes(axes: &[AxisName]) -> String {
    let names: Vec<_> = axes.iter().map(|a| a.as_str()).collect();
    format!("({})", names.join(","))
}

/// A validated, ordered sequence of axis names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<AxisName>", into = "Vec<AxisName>")]
pub struct AxisLayout(Vec<AxisName>);

impl AxisLayout {
    pub fn new(axes: impl Into<Vec<AxisName>>) -> crate::Result<Self> {
        let axes = axes.into();
        validate(&axes)?;
        Ok(Self(axes))
    }

    /// Parse a layout from single-letter names, e.g. `"tczyx"`.
    pub fn parse(names: &str) -> crate::Result<Self> {
        let axes = names
            .chars()
            .map(|ch| AxisName::parse(ch.encode_utf8(&mut [0; 4])))
            .collect::<crate::Result<Vec<_>>>()?;
        Self::new(axes)
    }

    pub fn axes(&self) -> &[AxisName] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AxisName> + '_ {
        self.0.iter().copied()
    }

    pub fn position(&self, axis: AxisName) -> Option<usize> {
        self.0.iter().position(|&a| a == axis)
    }

    pub fn contains(&self, axis: AxisName) -> bool {
        self.0.contains(&axis)
    }

    /// Indices of the spatial axes, in layout order.
    pub fn spatial_indices(&self) -> Vec<usize> {
        self.iter()
            .enumerate()
            .filter(|(_, a)| a.is_spatial())
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn spatial_axes(&self) -> Vec<AxisName> {
        self.iter().filter(|a| a.is_spatial()).collect()
    }

    /// Names as plain strings, e.g. for `_ARRAY_DIMENSIONS`.
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|a| a.as_str().to_owned()).collect()
    }
}

impl TryFrom<Vec<AxisName>> for AxisLayout {
    type Error = crate::Error;

    fn try_from(value: Vec<AxisName>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AxisLayout> for Vec<AxisName> {
    fn from(value: AxisLayout) -> Self {
        value.0
    }
}

impl fmt::Display for AxisLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_axes(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tuples(len: usize) -> Vec<Vec<AxisName>> {
        let mut out = vec![vec![]];
        for _ in 0..len {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    AxisName::CANONICAL.iter().map(move |&ax| {
                        let mut next = prefix.clone();
                        next.push(ax);
                        next
                    })
                })
                .collect();
        }
        out
    }

    #[test]
    fn accepts_exactly_the_permitted_layouts() {
        for len in 2..=5 {
            let permitted = permitted_layouts(len);
            let mut accepted = 0;
            for axes in all_tuples(len) {
                let ok = validate(&axes).is_ok();
                assert_eq!(ok, permitted.contains(&axes.as_slice()), "{axes:?}");
                if ok {
                    accepted += 1;
                }
            }
            assert_eq!(accepted, permitted.len());
        }
    }

    #[test]
    fn rejects_reordered_axes() {
        assert!(AxisLayout::parse("yx").is_ok());
        assert!(matches!(
            AxisLayout::parse("xy"),
            Err(crate::Error::InvalidLayout(_))
        ));
        assert!(AxisLayout::parse("cyx").is_ok());
        assert!(AxisLayout::parse("yxc").is_err());
        assert!(AxisLayout::parse("ctyx").is_err());
    }

    #[test]
    fn rejects_bad_lengths_duplicates_and_unknown_names() {
        assert!(AxisLayout::parse("x").is_err());
        assert!(AxisLayout::parse("tczyxx").is_err());
        assert!(AxisLayout::parse("yy").is_err());
        assert!(AxisLayout::parse("qyx").is_err());
    }

    #[test]
    fn spatial_helpers() {
        let layout = AxisLayout::parse("tczyx").unwrap();
        assert_eq!(layout.spatial_indices(), vec![2, 3, 4]);
        assert_eq!(layout.spatial_axes(), vec![Z, Y, X]);
        assert_eq!(layout.names(), vec!["t", "c", "z", "y", "x"]);
        assert_eq!(layout.to_string(), "(t,c,z,y,x)");
    }

    #[test]
    fn layout_serde() {
        let layout: AxisLayout = serde_json::from_str(r#"["c","y","x"]"#).unwrap();
        assert_eq!(layout, AxisLayout::parse("cyx").unwrap());
        assert!(serde_json::from_str::<AxisLayout>(r#"["x","y"]"#).is_err());
        assert_eq!(serde_json::to_string(&layout).unwrap(), r#"["c","y","x"]"#);
    }
}
