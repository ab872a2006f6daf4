use thiserror::Error;

use crate::{
    allocator::{CpuAllocator, TensorAllocator, TensorAllocatorError},
    dtype::{cast_slice, cast_slice_mut, DataType, TensorElement},
    shape::{Order, ShapeDescriptor},
    storage::{Ownership, TensorStorage},
    view::{TensorView, TensorViewMut},
};

/// An error type for tensor construction and access.
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    /// The requested rank exceeds the supported maximum.
    ///
    /// Shape descriptors hold at most [`crate::MAX_RANK`] dimensions.
    #[error("Rank {rank} exceeds the maximum supported rank of {max}")]
    ShapeError {
        /// Requested number of dimensions
        rank: usize,
        /// Maximum number of dimensions
        max: usize,
    },

    /// The number of provided values does not match the shape.
    #[error("Shape mismatch: expected {expected} elements, but got {actual}")]
    SizeMismatch {
        /// Number of elements required by the shape
        expected: usize,
        /// Number of elements provided
        actual: usize,
    },

    /// Typed access with a type that differs from the buffer element type.
    #[error("Data type mismatch: buffer holds {expected}, accessed as {actual}")]
    DataTypeMismatch {
        /// Element type of the buffer
        expected: DataType,
        /// Element type requested by the caller
        actual: DataType,
    },

    /// A per-dimension list does not have one entry per dimension.
    #[error("Rank mismatch: expected {expected} entries, got {actual}")]
    RankMismatch {
        /// Expected number of entries
        expected: usize,
        /// Actual number of entries
        actual: usize,
    },

    /// The element count or the buffer span of a shape does not fit in `usize`.
    #[error("Shape {shape:?} addresses more elements than fit in memory")]
    SizeOverflow {
        /// The offending dimensions
        shape: Vec<usize>,
    },

    /// An axis is not smaller than the rank.
    #[error("Axis {axis} is out of range for rank {rank}")]
    InvalidAxis {
        /// The offending axis
        axis: usize,
        /// Rank of the tensor
        rank: usize,
    },

    /// The same axis appears twice in an axis list.
    #[error("Axis {0} appears more than once")]
    DuplicateAxis(usize),

    /// Index exceeds tensor bounds.
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index that was attempted
        index: usize,
        /// The size of the dimension being indexed
        size: usize,
    },

    /// Mutable access was requested while the buffer is shared with another handle.
    #[error("Buffer is shared with another handle and cannot be mutated")]
    StorageShared,

    /// Underlying storage operation failed.
    #[error("Storage error: {0}")]
    StorageError(#[from] TensorAllocatorError),
}

impl TensorError {
    /// Creates a SizeMismatch error.
    pub fn size_mismatch(expected: usize, actual: usize) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    /// Creates an IndexOutOfBounds error.
    pub fn index_out_of_bounds(index: usize, size: usize) -> Self {
        Self::IndexOutOfBounds { index, size }
    }

    /// Returns true if this error indicates a programming error rather than a
    /// resource failure.
    pub fn is_programming_error(&self) -> bool {
        !matches!(self, Self::StorageError(_))
    }
}

/// A strided N-dimensional array handle.
///
/// The handle couples a [`ShapeDescriptor`] with a reference-counted byte buffer. The
/// element type is carried at runtime by the descriptor; typed access checks it
/// against the requested Rust type.
///
/// # Example
///
/// ```
/// use ndtad_tensor::{NdArray, Order};
///
/// let t = NdArray::from_values(Order::C, &[2, 2], &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
/// assert_eq!(t.get::<f32>(&[1, 0]).unwrap(), 3.0);
/// assert_eq!(t.len(), 4);
/// ```
pub struct NdArray<A: TensorAllocator = CpuAllocator> {
    pub(crate) storage: TensorStorage<A>,
    pub(crate) descriptor: ShapeDescriptor,
}

impl<A: TensorAllocator> NdArray<A> {
    pub(crate) fn from_parts(storage: TensorStorage<A>, descriptor: ShapeDescriptor) -> Self {
        Self {
            storage,
            descriptor,
        }
    }

    /// The shape descriptor of the array.
    #[inline]
    pub fn descriptor(&self) -> &ShapeDescriptor {
        &self.descriptor
    }

    /// Dimension sizes.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.descriptor.shape()
    }

    /// Per-dimension strides, in elements.
    #[inline]
    pub fn strides(&self) -> &[usize] {
        self.descriptor.strides()
    }

    /// Memory order tag.
    #[inline]
    pub fn order(&self) -> Order {
        self.descriptor.order()
    }

    /// Element type.
    #[inline]
    pub fn dtype(&self) -> DataType {
        self.descriptor.dtype()
    }

    /// Number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.descriptor.rank()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptor.len()
    }

    /// Returns true if the array holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptor.is_empty()
    }

    /// Returns true if the array holds exactly one element.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.descriptor.is_scalar()
    }

    /// Release policy of the underlying buffer.
    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.storage.ownership()
    }

    /// The underlying storage.
    #[inline]
    pub fn storage(&self) -> &TensorStorage<A> {
        &self.storage
    }

    /// The raw buffer bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_bytes()
    }

    /// The buffer as a typed slice, in memory order.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not the element type of the array.
    pub fn as_slice<T: TensorElement>(&self) -> Result<&[T], TensorError> {
        cast_slice(self.storage.as_bytes(), self.dtype())
    }

    /// The buffer as a mutable typed slice, in memory order.
    ///
    /// # Errors
    ///
    /// Fails on a type mismatch or if the buffer is shared with another handle.
    pub fn as_slice_mut<T: TensorElement>(&mut self) -> Result<&mut [T], TensorError> {
        let dtype = self.dtype();
        let bytes = self
            .storage
            .as_bytes_mut()
            .ok_or(TensorError::StorageShared)?;
        cast_slice_mut(bytes, dtype)
    }

    /// Reads the element at a multi-dimensional index.
    ///
    /// # Errors
    ///
    /// Fails on a type mismatch, a wrong index length or an out of bounds index.
    pub fn get<T: TensorElement>(&self, index: &[usize]) -> Result<T, TensorError> {
        if index.len() != self.rank() {
            return Err(TensorError::RankMismatch {
                expected: self.rank(),
                actual: index.len(),
            });
        }
        let offset = match self.descriptor.offset_of(index) {
            Some(offset) => offset,
            None => {
                let (i, size) = index
                    .iter()
                    .zip(self.shape())
                    .find(|&(&i, &size)| i >= size)
                    .map(|(&i, &size)| (i, size))
                    .unwrap_or((0, 0));
                return Err(TensorError::index_out_of_bounds(i, size));
            }
        };
        let data = self.as_slice::<T>()?;
        data.get(offset)
            .copied()
            .ok_or_else(|| TensorError::index_out_of_bounds(offset, data.len()))
    }

    /// Copies the elements out in logical row-major order.
    ///
    /// # Errors
    ///
    /// Fails if `T` is not the element type of the array.
    pub fn to_vec<T: TensorElement>(&self) -> Result<Vec<T>, TensorError> {
        let data = self.as_slice::<T>()?;
        let desc = &self.descriptor;
        if desc.is_row_major_contiguous() {
            return Ok(data[..desc.len()].to_vec());
        }
        Ok((0..desc.len())
            .map(|i| data[desc.index_to_offset(i)])
            .collect())
    }

    /// Sets every element to `value`.
    ///
    /// # Errors
    ///
    /// Fails on a type mismatch or if the buffer is shared.
    pub fn assign<T: TensorElement>(&mut self, value: T) -> Result<(), TensorError> {
        let len = self.len();
        let desc = self.descriptor.clone();
        let data = self.as_slice_mut::<T>()?;
        for i in 0..len {
            data[desc.index_to_offset(i)] = value;
        }
        Ok(())
    }

    /// Returns a handle with reordered dimensions sharing the same buffer.
    ///
    /// No data is copied; only the shape and strides are permuted.
    ///
    /// # Errors
    ///
    /// Fails unless `axes` is a permutation of `0..rank`.
    pub fn permute_axes(&self, axes: &[usize]) -> Result<Self, TensorError> {
        Ok(Self {
            storage: self.storage.clone(),
            descriptor: self.descriptor.permuted(axes)?,
        })
    }

    /// Returns a handle over the same buffer with explicit dimensions and strides.
    ///
    /// The order tag of `self` is kept. A column of a row-major matrix, for example,
    /// is `as_strided(&[rows], &[cols])`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid shape, or with [`TensorError::SizeMismatch`] when the
    /// strides address elements past the end of the buffer.
    ///
    /// # Example
    ///
    /// ```
    /// use ndtad_tensor::{NdArray, Order};
    ///
    /// let m = NdArray::from_values(Order::C, &[2, 3], &[1u8, 2, 3, 4, 5, 6]).unwrap();
    /// let first_column = m.as_strided(&[2], &[3]).unwrap();
    /// assert_eq!(first_column.to_vec::<u8>().unwrap(), vec![1, 4]);
    /// ```
    pub fn as_strided(&self, dims: &[usize], strides: &[usize]) -> Result<Self, TensorError> {
        let descriptor = ShapeDescriptor::with_strides(dims, strides, self.dtype(), self.order())?;
        let available = self.storage.len() / self.dtype().size_of();
        if descriptor.required_span() > available {
            return Err(TensorError::size_mismatch(
                descriptor.required_span(),
                available,
            ));
        }
        Ok(Self {
            storage: self.storage.clone(),
            descriptor,
        })
    }

    /// Borrows the array as a view.
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            bytes: self.storage.as_bytes(),
            descriptor: &self.descriptor,
        }
    }

    /// Borrows the array as a mutable view.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is shared with another handle.
    pub fn view_mut(&mut self) -> Result<TensorViewMut<'_>, TensorError> {
        let bytes = self
            .storage
            .as_bytes_mut()
            .ok_or(TensorError::StorageShared)?;
        Ok(TensorViewMut {
            bytes,
            descriptor: &self.descriptor,
        })
    }
}

impl<A: TensorAllocator> Clone for NdArray<A> {
    /// Creates another handle to the same buffer.
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            descriptor: self.descriptor.clone(),
        }
    }
}

impl<A: TensorAllocator> std::fmt::Debug for NdArray<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdArray")
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("order", &self.order())
            .field("dtype", &self.dtype())
            .field("ownership", &self.ownership())
            .finish()
    }
}
