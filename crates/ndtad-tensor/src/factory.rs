//! Constructors for [`NdArray`] handles.
//!
//! Every constructor comes in two forms: a `*_in` form taking the allocator that
//! provides the buffer, and a short form using the heap [`CpuAllocator`].

use num_traits::{AsPrimitive, Float};

use crate::{
    allocator::{CpuAllocator, TensorAllocator},
    dtype::{DataType, TensorElement},
    shape::{Order, ShapeDescriptor},
    storage::TensorStorage,
    tensor::{NdArray, TensorError},
};

/// Reinterprets a typed slice as its raw bytes.
fn element_bytes<T: TensorElement>(values: &[T]) -> &[u8] {
    // SAFETY: every tensor element type is plain data without padding.
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, std::mem::size_of_val(values)) }
}

impl<A: TensorAllocator> NdArray<A> {
    /// Allocates a zero-filled buffer covering every offset `descriptor` can address.
    fn zeroed_in(descriptor: ShapeDescriptor, alloc: A) -> Result<Self, TensorError> {
        let dtype = descriptor.dtype();
        let storage = TensorStorage::new_zeroed(
            descriptor.required_span() * dtype.size_of(),
            dtype.align_of(),
            alloc,
        )?;
        Ok(Self::from_parts(storage, descriptor))
    }

    /// Creates a zero-initialized array with canonical strides for `order`.
    ///
    /// # Errors
    ///
    /// Fails with [`TensorError::ShapeError`] when the rank exceeds the maximum, or
    /// when the allocator fails.
    pub fn from_shape_in(
        order: Order,
        dims: &[usize],
        dtype: DataType,
        alloc: A,
    ) -> Result<Self, TensorError> {
        let descriptor = ShapeDescriptor::new(dims, dtype, order)?;
        Self::zeroed_in(descriptor, alloc)
    }

    /// Creates a rank-0 array holding `value`.
    pub fn from_scalar_in<T: TensorElement>(value: T, alloc: A) -> Result<Self, TensorError> {
        let storage =
            TensorStorage::from_bytes(element_bytes(&[value]), T::DTYPE.align_of(), alloc)?;
        Ok(Self::from_parts(storage, ShapeDescriptor::scalar(T::DTYPE)))
    }

    /// Creates an array whose buffer is a copy of `values`, in memory order.
    ///
    /// # Errors
    ///
    /// Fails with [`TensorError::SizeMismatch`] when `values` does not hold exactly
    /// one element per position of `dims`.
    pub fn from_values_in<T: TensorElement>(
        order: Order,
        dims: &[usize],
        values: &[T],
        alloc: A,
    ) -> Result<Self, TensorError> {
        let descriptor = ShapeDescriptor::new(dims, T::DTYPE, order)?;
        if values.len() != descriptor.len() {
            return Err(TensorError::size_mismatch(descriptor.len(), values.len()));
        }
        let storage = TensorStorage::from_bytes(element_bytes(values), T::DTYPE.align_of(), alloc)?;
        Ok(Self::from_parts(storage, descriptor))
    }

    /// Creates an array with every element set to `value`.
    pub fn from_broadcast_value_in<T: TensorElement>(
        dims: &[usize],
        value: T,
        order: Order,
        alloc: A,
    ) -> Result<Self, TensorError> {
        let mut array = Self::from_shape_in(order, dims, T::DTYPE, alloc)?;
        // the buffer starts zeroed; only an all-zero bit pattern may skip the fill
        if element_bytes(&[value]).iter().any(|&b| b != 0) {
            array.as_slice_mut::<T>()?.fill(value);
        }
        Ok(array)
    }

    /// Creates an array with every element equal to the single element of `value`.
    ///
    /// The element type is taken from `value`.
    ///
    /// # Errors
    ///
    /// Fails with [`TensorError::SizeMismatch`] unless `value` holds exactly one
    /// element.
    pub fn from_broadcast_array_in<B: TensorAllocator>(
        dims: &[usize],
        value: &NdArray<B>,
        order: Order,
        alloc: A,
    ) -> Result<Self, TensorError> {
        if value.len() != 1 {
            return Err(TensorError::size_mismatch(1, value.len()));
        }
        let size = value.dtype().size_of();
        let start = value.descriptor().index_to_offset(0) * size;
        let element = &value.as_bytes()[start..start + size];

        let mut array = Self::from_shape_in(order, dims, value.dtype(), alloc)?;
        let bytes = array
            .storage
            .as_bytes_mut()
            .ok_or(TensorError::StorageShared)?;
        for chunk in bytes.chunks_exact_mut(size) {
            chunk.copy_from_slice(element);
        }
        Ok(array)
    }

    /// Creates a 1-D array of `count` evenly spaced values from `from` to `to`.
    ///
    /// Element `i` is `from * (1 - t) + to * t` with `t = i / (count - 1)`. A count
    /// of one yields `[from]` and a count of zero an empty array of shape `[0]`.
    pub fn linspace_in<T>(from: T, to: T, count: usize, alloc: A) -> Result<Self, TensorError>
    where
        T: TensorElement + Float,
        usize: AsPrimitive<T>,
    {
        let mut array = Self::from_shape_in(Order::C, &[count], T::DTYPE, alloc)?;
        let data = array.as_slice_mut::<T>()?;
        if count == 1 {
            data[0] = from;
        } else if count > 1 {
            let last: T = (count - 1).as_();
            for (i, x) in data.iter_mut().enumerate() {
                let i: T = i.as_();
                let t = i / last;
                *x = from * (T::one() - t) + to * t;
            }
        }
        Ok(array)
    }

    /// Creates a rank-0 array of length zero, flagged empty, without buffer memory.
    pub fn empty_in(dtype: DataType, alloc: A) -> Result<Self, TensorError> {
        Self::zeroed_in(ShapeDescriptor::empty(dtype), alloc)
    }

    /// Creates an array with the metadata of `source` and a fresh zeroed buffer.
    ///
    /// With `copy_strides` the strides of `source` are kept exactly, otherwise they
    /// are recomputed canonically for its order. No memory is shared with `source`.
    pub fn copy_descriptor_in<B: TensorAllocator>(
        source: &NdArray<B>,
        copy_strides: bool,
        alloc: A,
    ) -> Result<Self, TensorError> {
        let mut descriptor = source.descriptor().clone();
        if !copy_strides {
            descriptor.update_strides(descriptor.order());
        }
        Self::zeroed_in(descriptor, alloc)
    }

    /// Creates a 1-D array holding a copy of `values`.
    pub fn vector_in<T: TensorElement>(values: &[T], alloc: A) -> Result<Self, TensorError> {
        Self::from_values_in(Order::C, &[values.len()], values, alloc)
    }

    /// Creates a 1-D array of `len` elements equal to `value`.
    pub fn vector_with_value_in<T: TensorElement>(
        len: usize,
        value: T,
        alloc: A,
    ) -> Result<Self, TensorError> {
        Self::from_broadcast_value_in(&[len], value, Order::C, alloc)
    }

    /// Creates a rank-0 array of type `dtype` holding zero.
    pub fn zero_scalar_in(dtype: DataType, alloc: A) -> Result<Self, TensorError> {
        Self::zeroed_in(ShapeDescriptor::scalar(dtype), alloc)
    }

    /// Wraps caller memory as an array without taking ownership of it.
    ///
    /// The buffer is laid out with canonical strides for `order`.
    ///
    /// # Errors
    ///
    /// Fails with [`TensorError::SizeMismatch`] when `len` is smaller than the number
    /// of elements of `dims`.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` elements of `T`, and the
    /// memory must outlive the returned array and every handle derived from it.
    pub unsafe fn view_from_buffer_in<T: TensorElement>(
        ptr: *mut T,
        len: usize,
        order: Order,
        dims: &[usize],
        alloc: A,
    ) -> Result<Self, TensorError> {
        let descriptor = ShapeDescriptor::new(dims, T::DTYPE, order)?;
        if len < descriptor.len() {
            return Err(TensorError::size_mismatch(descriptor.len(), len));
        }
        let storage = TensorStorage::from_raw_parts(
            ptr as *mut u8,
            len * std::mem::size_of::<T>(),
            std::mem::align_of::<T>(),
            alloc,
        );
        Ok(Self::from_parts(storage, descriptor))
    }
}

impl NdArray<CpuAllocator> {
    /// Creates a zero-initialized array on the heap.
    ///
    /// # Example
    ///
    /// ```
    /// use ndtad_tensor::{DataType, NdArray, Order};
    ///
    /// let t = NdArray::from_shape(Order::F, &[2, 3], DataType::F64).unwrap();
    /// assert_eq!(t.strides(), &[1, 2]);
    /// assert_eq!(t.to_vec::<f64>().unwrap(), vec![0.0; 6]);
    /// ```
    pub fn from_shape(order: Order, dims: &[usize], dtype: DataType) -> Result<Self, TensorError> {
        Self::from_shape_in(order, dims, dtype, CpuAllocator)
    }

    /// Creates a rank-0 array holding `value`.
    pub fn from_scalar<T: TensorElement>(value: T) -> Result<Self, TensorError> {
        Self::from_scalar_in(value, CpuAllocator)
    }

    /// Creates an array whose buffer is a copy of `values`, in memory order.
    pub fn from_values<T: TensorElement>(
        order: Order,
        dims: &[usize],
        values: &[T],
    ) -> Result<Self, TensorError> {
        Self::from_values_in(order, dims, values, CpuAllocator)
    }

    /// Creates an array with every element set to `value`.
    pub fn from_broadcast_value<T: TensorElement>(
        dims: &[usize],
        value: T,
        order: Order,
    ) -> Result<Self, TensorError> {
        Self::from_broadcast_value_in(dims, value, order, CpuAllocator)
    }

    /// Creates an array with every element equal to the single element of `value`.
    pub fn from_broadcast_array<B: TensorAllocator>(
        dims: &[usize],
        value: &NdArray<B>,
        order: Order,
    ) -> Result<Self, TensorError> {
        Self::from_broadcast_array_in(dims, value, order, CpuAllocator)
    }

    /// Creates a 1-D array of `count` evenly spaced values from `from` to `to`.
    ///
    /// # Example
    ///
    /// ```
    /// use ndtad_tensor::NdArray;
    ///
    /// let t = NdArray::linspace(0.0f64, 10.0, 5).unwrap();
    /// assert_eq!(t.to_vec::<f64>().unwrap(), vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    /// ```
    pub fn linspace<T>(from: T, to: T, count: usize) -> Result<Self, TensorError>
    where
        T: TensorElement + Float,
        usize: AsPrimitive<T>,
    {
        Self::linspace_in(from, to, count, CpuAllocator)
    }

    /// Creates an empty rank-0 array.
    pub fn empty(dtype: DataType) -> Result<Self, TensorError> {
        Self::empty_in(dtype, CpuAllocator)
    }

    /// Creates an array with the metadata of `source` and a fresh zeroed buffer.
    pub fn copy_descriptor<B: TensorAllocator>(
        source: &NdArray<B>,
        copy_strides: bool,
    ) -> Result<Self, TensorError> {
        Self::copy_descriptor_in(source, copy_strides, CpuAllocator)
    }

    /// Creates a 1-D array holding a copy of `values`.
    pub fn vector<T: TensorElement>(values: &[T]) -> Result<Self, TensorError> {
        Self::vector_in(values, CpuAllocator)
    }

    /// Creates a 1-D array of `len` elements equal to `value`.
    pub fn vector_with_value<T: TensorElement>(len: usize, value: T) -> Result<Self, TensorError> {
        Self::vector_with_value_in(len, value, CpuAllocator)
    }

    /// Creates a rank-0 array of type `dtype` holding zero.
    pub fn zero_scalar(dtype: DataType) -> Result<Self, TensorError> {
        Self::zero_scalar_in(dtype, CpuAllocator)
    }

    /// Wraps caller memory as an array without taking ownership of it.
    ///
    /// # Safety
    ///
    /// See [`NdArray::view_from_buffer_in`].
    pub unsafe fn view_from_buffer<T: TensorElement>(
        ptr: *mut T,
        len: usize,
        order: Order,
        dims: &[usize],
    ) -> Result<Self, TensorError> {
        Self::view_from_buffer_in(ptr, len, order, dims, CpuAllocator)
    }
}
