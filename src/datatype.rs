//! Element types that may travel through the typed-buffer path.
//!
//! | Rust Type | Tag         | Wire encoding             |
//! |-----------|-------------|---------------------------|
//! | `i32`     | `I32` (0)   | 4 bytes, little endian    |
//! | `i64`     | `I64` (1)   | 8 bytes, little endian    |
//! | `f32`     | `F32` (2)   | 4 bytes, IEEE, little end |
//! | `f64`     | `F64` (3)   | 8 bytes, IEEE, little end |
//!
//! Any other element type is never sent as a buffer.

use crate::message::{Error, Result};
use crate::payload::Array;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::fmt;

mod sealed {
    pub trait Sealed {}
}

/// Wire tag of a buffer-eligible element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ElementType {
    /// 32-bit signed integer
    I32 = 0,
    /// 64-bit signed integer
    I64 = 1,
    /// 32-bit floating point
    F32 = 2,
    /// 64-bit floating point
    F64 = 3,
}

impl ElementType {
    /// All tags, ordered by their wire value.
    pub const ALL: [ElementType; 4] = [
        ElementType::I32,
        ElementType::I64,
        ElementType::F32,
        ElementType::F64,
    ];

    /// The tag's wire value.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Looks up a tag by its wire value.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.code() == code)
    }

    /// Size in bytes of one encoded element.
    pub fn width(self) -> usize {
        match self {
            ElementType::I32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::F64 => 8,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::I32 => "int32",
            ElementType::I64 => "int64",
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// A primitive that has a native typed-buffer encoding.
///
/// This trait is sealed; it is implemented for [`i32`], [`i64`], [`f32`] and
/// [`f64`] only.
pub trait Element: sealed::Sealed + Copy + Default + Send + Sync + 'static {
    /// The wire tag for this type.
    const TAG: ElementType;

    /// Appends the encoding of `values` to `out`.
    fn write_le(values: &[Self], out: &mut Vec<u8>);

    /// Decodes `bytes` into `out`, which must hold exactly as many elements
    /// as `bytes` encodes.
    fn read_le(bytes: &[u8], out: &mut [Self]) -> Result<()>;

    /// Wraps a typed array into the dynamic [`Array`].
    fn into_array(array: ArrayD<Self>) -> Array;

    /// Unwraps the dynamic [`Array`] if it holds this element type.
    fn from_array(array: Array) -> std::result::Result<ArrayD<Self>, Array>;

    /// Borrows the typed array behind a dynamic [`Array`].
    fn as_array(array: &Array) -> Option<&ArrayD<Self>>;
}

macro_rules! impl_element {
    ($ty:ty, $tag:expr, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const TAG: ElementType = $tag;

            fn write_le(values: &[Self], out: &mut Vec<u8>) {
                out.reserve(values.len() * $tag.width());
                for value in values {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }

            fn read_le(bytes: &[u8], out: &mut [Self]) -> Result<()> {
                let width = $tag.width();
                if bytes.len() % width != 0 {
                    return Err(Error::Malformed(format!(
                        "{} bytes is not a whole number of {} elements",
                        bytes.len(),
                        $tag
                    )));
                }
                if bytes.len() / width != out.len() {
                    return Err(Error::BufferLength {
                        expected: out.len(),
                        actual: bytes.len() / width,
                    });
                }
                for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(width)) {
                    let raw = chunk
                        .try_into()
                        .map_err(|_| Error::Malformed("short element".into()))?;
                    *value = <$ty>::from_le_bytes(raw);
                }
                Ok(())
            }

            fn into_array(array: ArrayD<Self>) -> Array {
                Array::$variant(array)
            }

            fn from_array(array: Array) -> std::result::Result<ArrayD<Self>, Array> {
                match array {
                    Array::$variant(array) => Ok(array),
                    other => Err(other),
                }
            }

            fn as_array(array: &Array) -> Option<&ArrayD<Self>> {
                match array {
                    Array::$variant(array) => Some(array),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(i32, ElementType::I32, I32);
impl_element!(i64, ElementType::I64, I64);
impl_element!(f32, ElementType::F32, F32);
impl_element!(f64, ElementType::F64, F64);

/// Runs `$body` with `$t` bound to the Rust type behind an [`ElementType`].
macro_rules! with_element_type {
    ($tag:expr, $t:ident => $body:expr) => {
        match $tag {
            $crate::datatype::ElementType::I32 => {
                type $t = i32;
                $body
            }
            $crate::datatype::ElementType::I64 => {
                type $t = i64;
                $body
            }
            $crate::datatype::ElementType::F32 => {
                type $t = f32;
                $body
            }
            $crate::datatype::ElementType::F64 => {
                type $t = f64;
                $body
            }
        }
    };
}

pub(crate) use with_element_type;
