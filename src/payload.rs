//! Dynamic payloads and the buffer eligibility classifier.

use crate::datatype::{Element, ElementType};
use crate::error::{Error, Result};
use ciborium::value::Value;
use ndarray::{ArrayD, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An n-dimensional array with a runtime element type.
///
/// `U8` and `Bool` have no typed-buffer encoding, so such arrays always take
/// the generic path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Array {
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    U8(ArrayD<u8>),
    Bool(ArrayD<bool>),
}

macro_rules! map_array {
    ($array:expr, $a:ident => $body:expr) => {
        match $array {
            Array::I32($a) => $body,
            Array::I64($a) => $body,
            Array::F32($a) => $body,
            Array::F64($a) => $body,
            Array::U8($a) => $body,
            Array::Bool($a) => $body,
        }
    };
}

macro_rules! map_array_into {
    ($array:expr, $a:ident => $body:expr) => {
        match $array {
            Array::I32($a) => Array::I32($body),
            Array::I64($a) => Array::I64($body),
            Array::F32($a) => Array::F32($body),
            Array::F64($a) => Array::F64($body),
            Array::U8($a) => Array::U8($body),
            Array::Bool($a) => Array::Bool($body),
        }
    };
}

impl Array {
    /// The array's shape.
    pub fn shape(&self) -> &[usize] {
        map_array!(self, a => a.shape())
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        map_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The wire tag of the element type, or `None` when the element type has
    /// no typed-buffer encoding.
    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            Array::I32(_) => Some(ElementType::I32),
            Array::I64(_) => Some(ElementType::I64),
            Array::F32(_) => Some(ElementType::F32),
            Array::F64(_) => Some(ElementType::F64),
            Array::U8(_) | Array::Bool(_) => None,
        }
    }

    /// Whether the elements are laid out contiguously in row-major order.
    pub fn is_standard_layout(&self) -> bool {
        map_array!(self, a => a.is_standard_layout())
    }

    /// Splits the array along axis 0 into owned rows.
    fn into_rows(self) -> Vec<Array> {
        match self {
            Array::I32(a) => rows(a).map(Array::I32).collect(),
            Array::I64(a) => rows(a).map(Array::I64).collect(),
            Array::F32(a) => rows(a).map(Array::F32).collect(),
            Array::F64(a) => rows(a).map(Array::F64).collect(),
            Array::U8(a) => rows(a).map(Array::U8).collect(),
            Array::Bool(a) => rows(a).map(Array::Bool).collect(),
        }
    }

    /// Returns the array with its axes reversed (a transposed, non-contiguous
    /// view of the same elements for arrays of two or more dimensions).
    pub fn reversed_axes(self) -> Array {
        map_array_into!(self, a => a.reversed_axes())
    }
}

fn rows<T: Clone>(array: ArrayD<T>) -> impl Iterator<Item = ArrayD<T>> {
    let rows: Vec<_> = array.outer_iter().map(|row| row.to_owned()).collect();
    rows.into_iter()
}

/// Anything that can be communicated: a numeric array or a generic
/// serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Array(Array),
    Value(Value),
}

impl Payload {
    /// Serializes any value into a generic payload.
    pub fn object<T: Serialize + ?Sized>(value: &T) -> Result<Payload> {
        Value::serialized(value)
            .map(Payload::Value)
            .map_err(|e| Error::InvalidArgument(format!("value is not serializable: {e}")))
    }

    /// Deserializes a generic payload back into a concrete value.
    pub fn to_object<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Payload::Value(value) => value
                .deserialized()
                .map_err(|e| Error::InvalidArgument(format!("unexpected value: {e}"))),
            Payload::Array(_) => Err(Error::InvalidArgument(
                "payload is an array, not a value".into(),
            )),
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Payload::Array(array) => Some(array),
            Payload::Value(_) => None,
        }
    }

    pub fn into_array(self) -> Option<Array> {
        match self {
            Payload::Array(array) => Some(array),
            Payload::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(value) => Some(value),
            Payload::Array(_) => None,
        }
    }

    /// Borrows the typed array if this payload holds elements of type `T`.
    pub fn typed<T: Element>(&self) -> Option<&ArrayD<T>> {
        self.as_array().and_then(T::as_array)
    }

    /// Splits a sequence payload into exactly `count` items: the elements of
    /// a `Value::Array`, or the rows of an array along axis 0.
    pub(crate) fn into_items(self, count: usize) -> Result<Vec<Payload>> {
        let items: Vec<Payload> = match self {
            Payload::Value(Value::Array(values)) => {
                values.into_iter().map(Payload::Value).collect()
            }
            Payload::Array(array) if array.ndim() > 0 => {
                array.into_rows().into_iter().map(Payload::Array).collect()
            }
            Payload::Array(_) => {
                return Err(Error::InvalidArgument(
                    "cannot scatter a zero-dimensional array".into(),
                ))
            }
            Payload::Value(_) => {
                return Err(Error::InvalidArgument(
                    "only sequences and arrays can be scattered".into(),
                ))
            }
        };
        if items.len() != count {
            return Err(Error::InvalidArgument(format!(
                "cannot scatter {} items over {} ranks",
                items.len(),
                count
            )));
        }
        Ok(items)
    }
}

impl From<Array> for Payload {
    fn from(array: Array) -> Self {
        Payload::Array(array)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Value(value)
    }
}

macro_rules! impl_from_array {
    ($ty:ty, $variant:ident) => {
        impl From<ArrayD<$ty>> for Payload {
            fn from(array: ArrayD<$ty>) -> Self {
                Payload::Array(Array::$variant(array))
            }
        }

        impl From<ArrayD<$ty>> for Array {
            fn from(array: ArrayD<$ty>) -> Self {
                Array::$variant(array)
            }
        }
    };
}

impl_from_array!(i32, I32);
impl_from_array!(i64, I64);
impl_from_array!(f32, F32);
impl_from_array!(f64, F64);
impl_from_array!(u8, U8);
impl_from_array!(bool, Bool);

/// The element type to use on the buffer path, or `None` when the payload
/// must be serialized.
pub fn buffer_element_type(payload: &Payload) -> Option<ElementType> {
    match payload {
        Payload::Array(array) if array.is_standard_layout() => array.element_type(),
        _ => None,
    }
}

/// Whether `payload` is a contiguous, homogeneously typed numeric array of a
/// type in the wire table.
pub fn is_buffer_eligible(payload: &Payload) -> bool {
    buffer_element_type(payload).is_some()
}

/// Removes a leading axis of length one.
pub(crate) fn squeeze_leading<T>(array: ArrayD<T>) -> ArrayD<T> {
    if array.ndim() > 0 && array.shape()[0] == 1 {
        array.remove_axis(Axis(0))
    } else {
        array
    }
}
