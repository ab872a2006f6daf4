use serde::{Deserialize, Serialize};

use crate::{DataType, TensorError};

/// The maximum number of dimensions a shape descriptor can hold.
pub const MAX_RANK: usize = 32;

/// Memory layout convention of a tensor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// Row-major: the last dimension varies fastest in memory.
    #[default]
    C,
    /// Column-major: the first dimension varies fastest in memory.
    F,
}

impl Order {
    /// Returns the conventional single character tag (`'c'` or `'f'`).
    pub fn as_char(self) -> char {
        match self {
            Order::C => 'c',
            Order::F => 'f',
        }
    }

    /// Parses a single character tag, case-insensitive.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'c' => Some(Order::C),
            'f' => Some(Order::F),
            _ => None,
        }
    }
}

/// Property bits attached to a shape descriptor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayFlags(u32);

impl ArrayFlags {
    /// The array holds no elements.
    pub const EMPTY: ArrayFlags = ArrayFlags(1);

    /// Returns true if every bit of `other` is set.
    #[inline]
    pub fn contains(self, other: ArrayFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the bits of `other`.
    #[inline]
    pub fn insert(&mut self, other: ArrayFlags) {
        self.0 |= other.0;
    }

    /// Clears the bits of `other`.
    #[inline]
    pub fn remove(&mut self, other: ArrayFlags) {
        self.0 &= !other.0;
    }

    /// Raw bit representation.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }
}

/// Computes the canonical strides of a shape for the given memory order.
///
/// Strides are expressed in elements.
///
/// # Examples
///
/// ```rust
/// use ndtad_tensor::{get_strides_from_shape, Order};
///
/// assert_eq!(get_strides_from_shape(&[2, 3, 4], Order::C), vec![12, 4, 1]);
/// assert_eq!(get_strides_from_shape(&[2, 3, 4], Order::F), vec![1, 2, 6]);
/// ```
pub fn get_strides_from_shape(shape: &[usize], order: Order) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut stride = 1;
    match order {
        Order::C => {
            for i in (0..shape.len()).rev() {
                strides[i] = stride;
                stride *= shape[i];
            }
        }
        Order::F => {
            for i in 0..shape.len() {
                strides[i] = stride;
                stride *= shape[i];
            }
        }
    }
    strides
}

/// Validates an axis list against a rank and returns it sorted ascending.
///
/// # Errors
///
/// Fails if an axis is not smaller than `rank` or appears twice.
pub fn normalize_axes(axes: &[usize], rank: usize) -> Result<Vec<usize>, TensorError> {
    let mut sorted = axes.to_vec();
    sorted.sort_unstable();
    for (i, &axis) in sorted.iter().enumerate() {
        if axis >= rank {
            return Err(TensorError::InvalidAxis { axis, rank });
        }
        if i > 0 && sorted[i - 1] == axis {
            return Err(TensorError::DuplicateAxis(axis));
        }
    }
    Ok(sorted)
}

/// Shape, strides, memory order, element type and property flags of a tensor.
///
/// The descriptor is a validated value type: its rank never exceeds [`MAX_RANK`] and
/// its stride list always has one entry per dimension. Strides are canonical for the
/// order unless the descriptor was built with [`ShapeDescriptor::with_strides`] or
/// derived by [`ShapeDescriptor::permuted`].
///
/// Logical element order is row-major over the coordinates regardless of the memory
/// order; [`ShapeDescriptor::index_to_offset`] maps a logical index to a buffer offset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawShapeDescriptor")]
pub struct ShapeDescriptor {
    shape: Vec<usize>,
    strides: Vec<usize>,
    order: Order,
    dtype: DataType,
    flags: ArrayFlags,
}

/// Unvalidated wire form of a [`ShapeDescriptor`].
#[derive(Deserialize)]
struct RawShapeDescriptor {
    shape: Vec<usize>,
    strides: Vec<usize>,
    order: Order,
    dtype: DataType,
    #[serde(default)]
    flags: ArrayFlags,
}

impl TryFrom<RawShapeDescriptor> for ShapeDescriptor {
    type Error = TensorError;

    fn try_from(raw: RawShapeDescriptor) -> Result<Self, Self::Error> {
        let mut desc = Self::with_strides(&raw.shape, &raw.strides, raw.dtype, raw.order)?;
        // rank-0 descriptors carry emptiness only in their flags
        if desc.rank() == 0 && raw.flags.contains(ArrayFlags::EMPTY) {
            desc.flags.insert(ArrayFlags::EMPTY);
        }
        Ok(desc)
    }
}

impl ShapeDescriptor {
    /// Builds a descriptor with canonical strides for `order`.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::ShapeError`] when the rank exceeds [`MAX_RANK`] and
    /// [`TensorError::SizeOverflow`] when the element count does not fit in `usize`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ndtad_tensor::{DataType, Order, ShapeDescriptor};
    ///
    /// let desc = ShapeDescriptor::new(&[2, 3], DataType::F32, Order::F).unwrap();
    /// assert_eq!(desc.strides(), &[1, 2]);
    /// assert_eq!(desc.len(), 6);
    /// ```
    pub fn new(dims: &[usize], dtype: DataType, order: Order) -> Result<Self, TensorError> {
        check_rank(dims.len())?;
        check_len(dims)?;
        let strides = get_strides_from_shape(dims, order);
        Ok(Self::from_parts(dims.to_vec(), strides, order, dtype))
    }

    /// Builds a descriptor with explicit, possibly non-canonical strides.
    ///
    /// # Errors
    ///
    /// Fails on rank overflow, when the stride list length differs from the rank, or
    /// when the element count or the addressed span does not fit in `usize`.
    pub fn with_strides(
        dims: &[usize],
        strides: &[usize],
        dtype: DataType,
        order: Order,
    ) -> Result<Self, TensorError> {
        check_rank(dims.len())?;
        if strides.len() != dims.len() {
            return Err(TensorError::RankMismatch {
                expected: dims.len(),
                actual: strides.len(),
            });
        }
        check_len(dims)?;
        if span_of(dims, strides).is_none() {
            return Err(TensorError::SizeOverflow {
                shape: dims.to_vec(),
            });
        }
        Ok(Self::from_parts(
            dims.to_vec(),
            strides.to_vec(),
            order,
            dtype,
        ))
    }

    /// A rank-0 descriptor holding a single element.
    pub fn scalar(dtype: DataType) -> Self {
        Self::from_parts(Vec::new(), Vec::new(), Order::C, dtype)
    }

    /// A rank-0 descriptor flagged empty, holding no elements.
    pub fn empty(dtype: DataType) -> Self {
        let mut desc = Self::scalar(dtype);
        desc.flags.insert(ArrayFlags::EMPTY);
        desc
    }

    fn from_parts(shape: Vec<usize>, strides: Vec<usize>, order: Order, dtype: DataType) -> Self {
        let mut flags = ArrayFlags::default();
        if shape.iter().any(|&d| d == 0) {
            flags.insert(ArrayFlags::EMPTY);
        }
        Self {
            shape,
            strides,
            order,
            dtype,
            flags,
        }
    }

    /// Number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Dimension sizes.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Per-dimension strides, in elements.
    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Memory order tag.
    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    /// Element type tag.
    #[inline]
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Property flags.
    #[inline]
    pub fn flags(&self) -> ArrayFlags {
        self.flags
    }

    /// Total number of elements; zero for empty descriptors.
    #[inline]
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.shape.iter().product()
    }

    /// Returns true if the empty flag is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.contains(ArrayFlags::EMPTY)
    }

    /// Returns true if the descriptor holds exactly one element.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.len() == 1
    }

    /// Size of the buffer region, in elements, addressable through these strides.
    ///
    /// Construction rejects descriptors whose span does not fit in `usize`.
    pub fn required_span(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        span_of(&self.shape, &self.strides).unwrap_or(usize::MAX)
    }

    /// Maps a logical (row-major) element index to a buffer offset.
    ///
    /// The index must be smaller than [`ShapeDescriptor::len`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use ndtad_tensor::{DataType, Order, ShapeDescriptor};
    ///
    /// let desc = ShapeDescriptor::new(&[2, 3], DataType::F32, Order::F).unwrap();
    /// // element (0, 1) lives two elements into a column-major buffer
    /// assert_eq!(desc.index_to_offset(1), 2);
    /// ```
    pub fn index_to_offset(&self, index: usize) -> usize {
        let mut remaining = index;
        let mut offset = 0;
        for (&size, &stride) in self.shape.iter().zip(self.strides.iter()).rev() {
            if size > 1 {
                offset += (remaining % size) * stride;
                remaining /= size;
            }
        }
        offset
    }

    /// Buffer offset of the element at `index`, or `None` if out of bounds.
    pub fn offset_of(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.rank() || self.is_empty() {
            return None;
        }
        let mut offset = 0;
        for ((&i, &size), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            if i >= size {
                return None;
            }
            offset += i * stride;
        }
        Some(offset)
    }

    /// The constant step between consecutive elements when the layout can be walked
    /// linearly in the descriptor's order, `None` otherwise.
    ///
    /// Unit dimensions are ignored. A C-ordered descriptor is linear when every
    /// stride equals the next stride times the next dimension; an F-ordered one when
    /// every stride equals the previous stride times the previous dimension.
    pub fn element_wise_stride(&self) -> Option<usize> {
        let dims = self
            .shape
            .iter()
            .zip(self.strides.iter())
            .filter(|&(&size, _)| size != 1)
            .map(|(&size, &stride)| (size, stride));
        let dims: Vec<(usize, usize)> = match self.order {
            Order::C => dims.rev().collect(),
            Order::F => dims.collect(),
        };

        let Some(&(first_size, ews)) = dims.first() else {
            return Some(1);
        };
        if ews == 0 {
            return None;
        }
        let mut expected = ews * first_size;
        for &(size, stride) in dims.iter().skip(1) {
            if stride != expected {
                return None;
            }
            expected *= size;
        }
        Some(ews)
    }

    /// Returns true if strides are non-increasing for C order or non-decreasing for
    /// F order, ignoring unit dimensions.
    pub fn is_stride_monotonic(&self) -> bool {
        let strides: Vec<usize> = self
            .shape
            .iter()
            .zip(self.strides.iter())
            .filter(|&(&size, _)| size != 1)
            .map(|(_, &stride)| stride)
            .collect();
        strides.windows(2).all(|w| match self.order {
            Order::C => w[0] >= w[1],
            Order::F => w[0] <= w[1],
        })
    }

    /// Returns true if the logical index of every element equals its buffer offset.
    pub fn is_row_major_contiguous(&self) -> bool {
        let mut expected = 1;
        for (&size, &stride) in self.shape.iter().zip(self.strides.iter()).rev() {
            if size == 1 {
                continue;
            }
            if stride != expected {
                return false;
            }
            expected *= size;
        }
        true
    }

    /// Returns true if the strides are the canonical ones for the current order.
    pub fn has_canonical_strides(&self) -> bool {
        self.strides == get_strides_from_shape(&self.shape, self.order)
    }

    /// Recomputes canonical strides for `order` and adopts it as the order tag.
    pub fn update_strides(&mut self, order: Order) {
        self.order = order;
        self.strides = get_strides_from_shape(&self.shape, order);
    }

    /// Returns a descriptor with dimensions and strides reordered by `axes`.
    ///
    /// # Errors
    ///
    /// Fails unless `axes` is a permutation of `0..rank`.
    pub fn permuted(&self, axes: &[usize]) -> Result<Self, TensorError> {
        if axes.len() != self.rank() {
            return Err(TensorError::RankMismatch {
                expected: self.rank(),
                actual: axes.len(),
            });
        }
        normalize_axes(axes, self.rank())?;
        let mut desc = self.clone();
        desc.shape = axes.iter().map(|&a| self.shape[a]).collect();
        desc.strides = axes.iter().map(|&a| self.strides[a]).collect();
        Ok(desc)
    }

    /// Returns a descriptor restricted to the given axes, keeping order and dtype.
    ///
    /// The axes must already be validated and sorted.
    pub(crate) fn select_axes(&self, axes: &[usize]) -> Self {
        let shape = axes.iter().map(|&a| self.shape[a]).collect();
        let strides = axes.iter().map(|&a| self.strides[a]).collect();
        Self::from_parts(shape, strides, self.order, self.dtype)
    }
}

/// One past the largest offset reachable through `strides`, `None` on overflow.
fn span_of(shape: &[usize], strides: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape
        .iter()
        .zip(strides.iter())
        .try_fold(1usize, |acc, (&d, &s)| acc.checked_add((d - 1).checked_mul(s)?))
}

/// Rejects shapes whose element count overflows. Zero dimensions are skipped so that
/// every partial product of the dimensions fits as well.
fn check_len(shape: &[usize]) -> Result<(), TensorError> {
    shape
        .iter()
        .filter(|&&d| d != 0)
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .map(|_| ())
        .ok_or_else(|| TensorError::SizeOverflow {
            shape: shape.to_vec(),
        })
}

fn check_rank(rank: usize) -> Result<(), TensorError> {
    if rank > MAX_RANK {
        return Err(TensorError::ShapeError {
            rank,
            max: MAX_RANK,
        });
    }
    Ok(())
}
