use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use crate::axis::{AxisLayout, AxisName};

/// Storage chunk shape, one positive extent per axis.
///
/// One chunk shape is shared by every level of a pyramid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct ChunkShape(Vec<u64>);

impl ChunkShape {
    pub fn new(shape: impl Into<Vec<u64>>) -> crate::Result<Self> {
        let shape = shape.into();
        if shape.is_empty() {
            return Err(crate::Error::InvalidChunkShape("empty chunk shape".into()));
        }
        if shape.contains(&0) {
            return Err(crate::Error::InvalidChunkShape(format!(
                "zero extent in {shape:?}"
            )));
        }
        Ok(Self(shape))
    }

    /// Choose the chunk shape for a layout.
    ///
    /// Spatial-led layouts get cubic 64³ chunks; layouts led by a channel or
    /// time axis chunk that axis singly so per-plane reads stay local.
    pub fn for_layout(layout: &AxisLayout) -> Self {
        let axes = layout.axes();
        let shape = match axes.len() {
            2 => vec![256, 256],
            3 if axes[0] == AxisName::Z => vec![64, 64, 64],
            3 => vec![1, 256, 256],
            4 if axes[..2] == [AxisName::T, AxisName::C] => vec![1, 1, 256, 256],
            4 => vec![1, 64, 64, 64],
            _ => vec![1, 1, 64, 64, 64],
        };
        Self(shape)
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Expand to `(t, c, z, y, x)`: axes absent from `layout` get a chunk extent of 1.
    pub fn expand_to_5d(&self, layout: &AxisLayout) -> Self {
        let shape = AxisName::CANONICAL
            .iter()
            .map(|&ax| layout.position(ax).map_or(1, |idx| self.0[idx]))
            .collect();
        Self(shape)
    }

    /// Chunk extents in the form `zarrs` array metadata takes them.
    pub(crate) fn to_nonzero(&self) -> Vec<NonZeroU64> {
        // extents were checked non-zero on construction
        self.0.iter().copied().filter_map(NonZeroU64::new).collect()
    }
}

/// Free-function form of [`ChunkShape::for_layout`].
pub fn choose_chunk_shape(layout: &AxisLayout) -> ChunkShape {
    ChunkShape::for_layout(layout)
}

impl TryFrom<Vec<u64>> for ChunkShape {
    type Error = crate::Error;

    fn try_from(value: Vec<u64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChunkShape> for Vec<u64> {
    fn from(value: ChunkShape) -> Self {
        value.0
    }
}
