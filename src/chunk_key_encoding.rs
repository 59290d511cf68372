use serde::{Deserialize, Serialize};
use zarrs::array::ChunkKeySeparator;

/// Separator between chunk grid indices in Zarr V2 chunk keys.
///
/// `/` nests chunks in directories, `.` keeps them flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DimensionSeparator {
    #[serde(rename = ".")]
    Dot,
    #[default]
    #[serde(rename = "/")]
    Slash,
}

impl DimensionSeparator {
    pub fn as_char(self) -> char {
        match self {
            DimensionSeparator::Dot => '.',
            DimensionSeparator::Slash => '/',
        }
    }
}

impl From<DimensionSeparator> for ChunkKeySeparator {
    fn from(value: DimensionSeparator) -> Self {
        match value {
            DimensionSeparator::Dot => ChunkKeySeparator::Dot,
            DimensionSeparator::Slash => ChunkKeySeparator::Slash,
        }
    }
}

impl From<ChunkKeySeparator> for DimensionSeparator {
    fn from(value: ChunkKeySeparator) -> Self {
        match value {
            ChunkKeySeparator::Dot => DimensionSeparator::Dot,
            ChunkKeySeparator::Slash => DimensionSeparator::Slash,
        }
    }
}
