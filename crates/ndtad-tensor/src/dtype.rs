use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TensorError;

/// Runtime element type tag carried by every shape descriptor.
///
/// The tag lets untyped handles (e.g. those built by [`crate::NdArray::from_shape`])
/// describe their buffer; typed access goes through [`TensorElement`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean stored as one byte.
    Bool,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 16-bit IEEE 754 half precision floating point.
    F16,
    /// 16-bit brain floating point.
    BF16,
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
}

impl DataType {
    /// Size of one element in bytes.
    #[inline]
    pub const fn size_of(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 | Self::F16 | Self::BF16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Alignment used for buffers of this type.
    #[inline]
    pub const fn align_of(self) -> usize {
        self.size_of()
    }

    /// Returns true for floating point types.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::BF16 | Self::F32 | Self::F64)
    }

    /// Returns true for every type that supports arithmetic.
    #[inline]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool)
    }

    /// Short lowercase name of the type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust type that can be stored in a tensor buffer.
///
/// Connects the static element type to the runtime [`DataType`] tag.
pub trait TensorElement: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The runtime tag for this type.
    const DTYPE: DataType;
}

macro_rules! impl_tensor_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl TensorElement for $ty {
                const DTYPE: DataType = DataType::$dtype;
            }
        )*
    };
}

impl_tensor_element!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    half::f16 => F16,
    half::bf16 => BF16,
    f32 => F32,
    f64 => F64,
);

fn check_dtype<T: TensorElement>(dtype: DataType) -> Result<(), TensorError> {
    if T::DTYPE != dtype {
        return Err(TensorError::DataTypeMismatch {
            expected: dtype,
            actual: T::DTYPE,
        });
    }
    Ok(())
}

/// Reinterprets a tensor byte buffer as a typed slice.
///
/// Buffers are always allocated with the alignment of their data type, so the
/// reinterpretation is sound once the type tag matches.
pub(crate) fn cast_slice<T: TensorElement>(
    bytes: &[u8],
    dtype: DataType,
) -> Result<&[T], TensorError> {
    check_dtype::<T>(dtype)?;
    if bytes.is_empty() {
        return Ok(&[]);
    }
    debug_assert_eq!(bytes.as_ptr().align_offset(std::mem::align_of::<T>()), 0);
    let len = bytes.len() / std::mem::size_of::<T>();
    // SAFETY: the buffer holds `len` initialized elements of `T` and is aligned for `T`.
    Ok(unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const T, len) })
}

/// Mutable counterpart of [`cast_slice`].
pub(crate) fn cast_slice_mut<T: TensorElement>(
    bytes: &mut [u8],
    dtype: DataType,
) -> Result<&mut [T], TensorError> {
    check_dtype::<T>(dtype)?;
    if bytes.is_empty() {
        return Ok(&mut []);
    }
    debug_assert_eq!(bytes.as_ptr().align_offset(std::mem::align_of::<T>()), 0);
    let len = bytes.len() / std::mem::size_of::<T>();
    // SAFETY: see `cast_slice`; exclusivity comes from the `&mut` borrow.
    Ok(unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut T, len) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_sizes() {
        assert_eq!(DataType::Bool.size_of(), 1);
        assert_eq!(DataType::U16.size_of(), 2);
        assert_eq!(DataType::F32.size_of(), 4);
        assert_eq!(DataType::I64.size_of(), 8);
        assert_eq!(<f64 as TensorElement>::DTYPE, DataType::F64);
        assert!(DataType::F32.is_float());
        assert!(DataType::BF16.is_float());
        assert_eq!(DataType::F16.size_of(), 2);
        assert_eq!(<half::bf16 as TensorElement>::DTYPE, DataType::BF16);
        assert!(!DataType::Bool.is_numeric());
    }

    #[test]
    fn test_cast_slice_rejects_wrong_type() {
        let bytes = [0u8; 8];
        let res = cast_slice::<f32>(&bytes, DataType::I32);
        assert_eq!(
            res.unwrap_err(),
            TensorError::DataTypeMismatch {
                expected: DataType::I32,
                actual: DataType::F32
            }
        );
    }

    #[test]
    fn test_dtype_serde() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&DataType::U8)?;
        assert_eq!(json, "\"U8\"");
        let back: DataType = serde_json::from_str(&json)?;
        assert_eq!(back, DataType::U8);
        Ok(())
    }
}
