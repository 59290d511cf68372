use crate::axis::AxisName;
use crate::data::DataType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The axis tuple is not one of the permitted layouts.
    #[error("invalid axis layout: {0}")]
    InvalidLayout(String),
    /// The spatial axes do not form a block the pyramid can dispatch on.
    #[error("unsupported axis layout: {0}")]
    UnsupportedLayout(String),
    #[error("calibration axes {found:?} do not match the spatial axes {expected:?}")]
    CalibrationAxisMismatch {
        expected: Vec<AxisName>,
        found: Vec<AxisName>,
    },
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    /// A resampled level changed element type.
    #[error("resampled level has data type {found:?}, expected {expected:?}")]
    DtypeDrift { expected: DataType, found: DataType },
    #[error(
        "axis {axis} went from extent {input} to {output}, which is not a downsampling by {factor}"
    )]
    ScaleFactorMismatch {
        axis: AxisName,
        input: u64,
        output: u64,
        factor: u64,
    },
    #[error("schema version {version} does not support {feature}")]
    UnsupportedBySchema {
        version: &'static str,
        feature: &'static str,
    },
    #[error("array has {found} dimensions but the axis layout has {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("invalid chunk shape: {0}")]
    InvalidChunkShape(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("invalid attributes at {path:?}: {reason}")]
    InvalidAttributes { path: String, reason: String },
    /// Arrays are never overwritten.
    #[error("an array already exists at {0:?}")]
    ArrayExists(String),
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    Storage(#[from] zarrs::storage::StorageError),
    #[error(transparent)]
    ArrayCreate(#[from] zarrs::array::ArrayCreateError),
    #[error(transparent)]
    Array(#[from] zarrs::array::ArrayError),
    #[error(transparent)]
    GroupCreate(#[from] zarrs::group::GroupCreateError),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    pub(crate) fn invalid_attributes(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAttributes {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }
}
