use crate::{
    dtype::{cast_slice, cast_slice_mut, DataType, TensorElement},
    shape::ShapeDescriptor,
    TensorError,
};

/// A non-owning, read-only view into array data.
///
/// The view borrows the buffer bytes and the shape descriptor of an
/// [`crate::NdArray`]. Typed access checks the requested element type against the
/// descriptor.
///
/// # Example
///
/// ```rust
/// use ndtad_tensor::{NdArray, Order};
///
/// let t = NdArray::from_values(Order::C, &[2, 2], &[1u8, 2, 3, 4]).unwrap();
/// let view = t.view();
/// assert_eq!(view.as_slice::<u8>().unwrap(), &[1, 2, 3, 4]);
/// assert_eq!(view.descriptor().shape(), &[2, 2]);
/// ```
#[derive(Copy, Clone, Debug)]
pub struct TensorView<'a> {
    pub(crate) bytes: &'a [u8],
    pub(crate) descriptor: &'a ShapeDescriptor,
}

impl<'a> TensorView<'a> {
    /// The shape descriptor of the viewed array.
    #[inline]
    pub fn descriptor(&self) -> &'a ShapeDescriptor {
        self.descriptor
    }

    /// Element type of the viewed array.
    #[inline]
    pub fn dtype(&self) -> DataType {
        self.descriptor.dtype()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptor.len()
    }

    /// Returns true if the view holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptor.is_empty()
    }

    /// The whole underlying buffer as a typed slice, in memory order.
    ///
    /// Elements visible through the view are found with
    /// [`ShapeDescriptor::index_to_offset`].
    pub fn as_slice<T: TensorElement>(&self) -> Result<&'a [T], TensorError> {
        cast_slice(self.bytes, self.descriptor.dtype())
    }
}

/// A non-owning, mutable view into array data.
#[derive(Debug)]
pub struct TensorViewMut<'a> {
    pub(crate) bytes: &'a mut [u8],
    pub(crate) descriptor: &'a ShapeDescriptor,
}

impl<'a> TensorViewMut<'a> {
    /// The shape descriptor of the viewed array.
    #[inline]
    pub fn descriptor(&self) -> &'a ShapeDescriptor {
        self.descriptor
    }

    /// Element type of the viewed array.
    #[inline]
    pub fn dtype(&self) -> DataType {
        self.descriptor.dtype()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.descriptor.len()
    }

    /// Returns true if the view holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptor.is_empty()
    }

    /// Consumes the view, returning the whole buffer as a mutable typed slice.
    pub fn into_slice_mut<T: TensorElement>(self) -> Result<&'a mut [T], TensorError> {
        cast_slice_mut(self.bytes, self.descriptor.dtype())
    }
}

#[cfg(test)]
mod tests {
    use crate::{NdArray, Order, TensorError};

    #[test]
    fn test_view_mut_writes_through() -> Result<(), TensorError> {
        let mut t = NdArray::from_values(Order::C, &[3], &[1.0f32, 2.0, 3.0])?;
        {
            let view = t.view_mut()?;
            assert_eq!(view.len(), 3);
            let data = view.into_slice_mut::<f32>()?;
            data[1] = 20.0;
        }
        assert_eq!(t.to_vec::<f32>()?, vec![1.0, 20.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_view_type_check() -> Result<(), TensorError> {
        let t = NdArray::from_values(Order::C, &[2], &[1i32, 2])?;
        assert!(t.view().as_slice::<i64>().is_err());
        Ok(())
    }
}
