//! In-memory image data tagged with its element type.

use ndarray::{ArrayD, Axis, IxDyn};
use num_traits::{NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Element types that can be stored in a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
}

impl DataType {
    /// Zarr V2 `dtype` string (little-endian).
    pub fn zarr_v2_dtype(self) -> &'static str {
        match self {
            DataType::UInt8 => "|u1",
            DataType::Int8 => "|i1",
            DataType::UInt16 => "<u2",
            DataType::Int16 => "<i2",
            DataType::UInt32 => "<u4",
            DataType::Int32 => "<i4",
            DataType::UInt64 => "<u8",
            DataType::Int64 => "<i8",
            DataType::Float32 => "<f4",
            DataType::Float64 => "<f8",
        }
    }

    /// Parse a little-endian Zarr V2 `dtype` string.
    pub fn from_zarr_v2_dtype(dtype: &str) -> Option<Self> {
        let data_type = match dtype {
            "|u1" | "<u1" => DataType::UInt8,
            "|i1" | "<i1" => DataType::Int8,
            "<u2" => DataType::UInt16,
            "<i2" => DataType::Int16,
            "<u4" => DataType::UInt32,
            "<i4" => DataType::Int32,
            "<u8" => DataType::UInt64,
            "<i8" => DataType::Int64,
            "<f4" => DataType::Float32,
            "<f8" => DataType::Float64,
            _ => return None,
        };
        Some(data_type)
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }
}

/// A numeric element type with a fixed [`DataType`].
///
/// Every element is also a `zarrs` element, so levels are encoded by `zarrs`.
pub trait Element:
    Copy
    + Default
    + PartialEq
    + std::fmt::Debug
    + NumCast
    + ToPrimitive
    + zarrs::array::ElementOwned
    + Send
    + Sync
    + 'static
{
    const DATA_TYPE: DataType;

    fn into_image_data(array: ArrayD<Self>) -> ImageData;

    fn from_image_data(data: ImageData) -> Result<ArrayD<Self>, ImageData>;
}

/// An N-dimensional array of one of the supported element types.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    UInt8(ArrayD<u8>),
    Int8(ArrayD<i8>),
    UInt16(ArrayD<u16>),
    Int16(ArrayD<i16>),
    UInt32(ArrayD<u32>),
    Int32(ArrayD<i32>),
    UInt64(ArrayD<u64>),
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

macro_rules! impl_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DATA_TYPE: DataType = DataType::$variant;

            fn into_image_data(array: ArrayD<Self>) -> ImageData {
                ImageData::$variant(array)
            }

            fn from_image_data(data: ImageData) -> Result<ArrayD<Self>, ImageData> {
                match data {
                    ImageData::$variant(array) => Ok(array),
                    other => Err(other),
                }
            }
        }

        impl From<ArrayD<$t>> for ImageData {
            fn from(value: ArrayD<$t>) -> Self {
                ImageData::$variant(value)
            }
        }
    };
}

impl_element!(u8, UInt8);
impl_element!(i8, Int8);
impl_element!(u16, UInt16);
impl_element!(i16, Int16);
impl_element!(u32, UInt32);
impl_element!(i32, Int32);
impl_element!(u64, UInt64);
impl_element!(i64, Int64);
impl_element!(f32, Float32);
impl_element!(f64, Float64);

/// Apply a generic expression to the array inside an [`ImageData`].
macro_rules! with_image_data {
    ($data:expr, $array:ident => $body:expr) => {
        match $data {
            $crate::data::ImageData::UInt8($array) => $body,
            $crate::data::ImageData::Int8($array) => $body,
            $crate::data::ImageData::UInt16($array) => $body,
            $crate::data::ImageData::Int16($array) => $body,
            $crate::data::ImageData::UInt32($array) => $body,
            $crate::data::ImageData::Int32($array) => $body,
            $crate::data::ImageData::UInt64($array) => $body,
            $crate::data::ImageData::Int64($array) => $body,
            $crate::data::ImageData::Float32($array) => $body,
            $crate::data::ImageData::Float64($array) => $body,
        }
    };
}
pub(crate) use with_image_data;

impl ImageData {
    pub fn data_type(&self) -> DataType {
        match self {
            ImageData::UInt8(_) => DataType::UInt8,
            ImageData::Int8(_) => DataType::Int8,
            ImageData::UInt16(_) => DataType::UInt16,
            ImageData::Int16(_) => DataType::Int16,
            ImageData::UInt32(_) => DataType::UInt32,
            ImageData::Int32(_) => DataType::Int32,
            ImageData::UInt64(_) => DataType::UInt64,
            ImageData::Int64(_) => DataType::Int64,
            ImageData::Float32(_) => DataType::Float32,
            ImageData::Float64(_) => DataType::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_image_data!(self, a => a.shape())
    }

    pub fn shape_u64(&self) -> Vec<u64> {
        self.shape().iter().map(|&n| n as u64).collect()
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Insert singleton axes so the array follows `(t, c, z, y, x)`.
    ///
    /// `present[i]` tells whether canonical axis `i` exists in the data.
    pub fn expand_to_5d(self, present: [bool; 5]) -> ImageData {
        with_image_data!(self, a => {
            let mut expanded = a;
            for (idx, &exists) in present.iter().enumerate() {
                if !exists {
                    expanded = expanded.insert_axis(Axis(idx));
                }
            }
            expanded.into()
        })
    }
}

/// Build a zero-filled array of the given shape and type.
pub fn zeros(data_type: DataType, shape: &[usize]) -> ImageData {
    fn z<T: Element>(shape: &[usize]) -> ImageData {
        T::into_image_data(ArrayD::<T>::default(IxDyn(shape)))
    }
    match data_type {
        DataType::UInt8 => z::<u8>(shape),
        DataType::Int8 => z::<i8>(shape),
        DataType::UInt16 => z::<u16>(shape),
        DataType::Int16 => z::<i16>(shape),
        DataType::UInt32 => z::<u32>(shape),
        DataType::Int32 => z::<i32>(shape),
        DataType::UInt64 => z::<u64>(shape),
        DataType::Int64 => z::<i64>(shape),
        DataType::Float32 => z::<f32>(shape),
        DataType::Float64 => z::<f64>(shape),
    }
}
